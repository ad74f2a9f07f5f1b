use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, DeriveInput};

use crate::attrs::{for_each_entry, named_fields, str_value};

pub fn expand(input: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(input as DeriveInput);
    match expand_params(&ast) {
        Ok(tokens) => tokens.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

fn expand_params(ast: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &ast.ident;
    let fields = named_fields(ast, "ToCyflowParams")?;

    let mut inserts = Vec::new();

    for f in fields {
        let Some(ident) = f.ident.as_ref() else { continue };
        let mut key = ident.to_string();
        let mut skip = false;
        for_each_entry(&f.attrs, |meta| {
            if meta.path.is_ident("skip") || meta.path.is_ident("id") {
                skip = true;
            } else if meta.path.is_ident("prop") {
                if let Some(p) = str_value(meta)? {
                    key = p;
                }
            }
            Ok(())
        })?;
        if skip {
            continue;
        }
        inserts.push(quote! {
            map.insert(#key.to_string(), cyflow_core::traits::IntoCyflowValue::into_value(self.#ident));
        });
    }

    Ok(quote! {
        impl cyflow_core::traits::ToCyflowParams for #name {
            fn to_params(self) -> std::collections::HashMap<String, cyflow_core::value::Value> {
                let mut map = std::collections::HashMap::new();
                #(#inserts)*
                map
            }
        }
    })
}
