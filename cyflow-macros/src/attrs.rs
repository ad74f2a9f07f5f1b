use syn::meta::ParseNestedMeta;
use syn::{Data, DeriveInput, Expr, ExprLit, Field, Fields, Lit};

/// Read `key = "value"` from a `#[cyflow(...)]` entry.
pub fn str_value(meta: &ParseNestedMeta<'_>) -> syn::Result<Option<String>> {
    let value = meta.value()?;
    let expr: Expr = value.parse()?;
    if let Expr::Lit(ExprLit { lit: Lit::Str(s), .. }) = expr {
        Ok(Some(s.value()))
    } else {
        Ok(None)
    }
}

/// Run `f` over every entry of every `#[cyflow(...)]` attribute in `attrs`.
pub fn for_each_entry(
    attrs: &[syn::Attribute],
    mut f: impl FnMut(&ParseNestedMeta<'_>) -> syn::Result<()>,
) -> syn::Result<()> {
    for attr in attrs {
        if attr.path().is_ident("cyflow") {
            attr.parse_nested_meta(|meta| f(&meta))?;
        }
    }
    Ok(())
}

/// The named fields of a struct, or a spanned error naming the derive.
pub fn named_fields<'a>(ast: &'a DeriveInput, derive: &str) -> syn::Result<Vec<&'a Field>> {
    match &ast.data {
        Data::Struct(s) => match &s.fields {
            Fields::Named(named) => Ok(named.named.iter().collect()),
            _ => Err(syn::Error::new_spanned(
                ast,
                format!("{derive} only supports structs with named fields"),
            )),
        },
        _ => Err(syn::Error::new_spanned(ast, format!("{derive} only supports structs"))),
    }
}
