use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, DeriveInput};

use crate::attrs::{for_each_entry, named_fields, str_value};

struct RelMeta {
    rel_type: String,
    source_labels: Vec<String>,
    target_labels: Vec<String>,
}

fn split_labels(labels: Option<String>) -> Vec<String> {
    labels
        .map(|l| {
            l.split('|')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

fn get_rel_meta(ast: &DeriveInput) -> syn::Result<RelMeta> {
    let mut rel_type = None;
    let mut from = None;
    let mut to = None;

    for_each_entry(&ast.attrs, |meta| {
        if meta.path.is_ident("type") {
            rel_type = str_value(meta)?;
        } else if meta.path.is_ident("from") {
            from = str_value(meta)?;
        } else if meta.path.is_ident("to") {
            to = str_value(meta)?;
        }
        Ok(())
    })?;

    Ok(RelMeta {
        rel_type: rel_type.unwrap_or_else(|| ast.ident.to_string()),
        source_labels: split_labels(from),
        target_labels: split_labels(to),
    })
}

pub fn expand(input: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(input as DeriveInput);
    match expand_relation(&ast) {
        Ok(tokens) => tokens.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

fn expand_relation(ast: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &ast.ident;
    let RelMeta {
        rel_type,
        source_labels,
        target_labels,
    } = get_rel_meta(ast)?;
    let fields = named_fields(ast, "CyflowRelation")?;

    let mut inits = Vec::new();

    for f in fields {
        let Some(ident) = f.ident.as_ref() else { continue };
        let key = ident.to_string();
        let ty = &f.ty;

        let mut prop_key = key.clone();
        let mut skip = false;
        for_each_entry(&f.attrs, |meta| {
            if meta.path.is_ident("prop") {
                if let Some(p) = str_value(meta)? {
                    prop_key = p;
                }
            } else if meta.path.is_ident("skip") {
                skip = true;
            }
            Ok(())
        })?;

        if skip {
            inits.push(quote! { #ident: ::std::default::Default::default() });
            continue;
        }

        inits.push(quote! {
            #ident: match cyflow_core::props::rel_prop(rel, #prop_key) {
                Some(v) => cyflow_core::decode::decode::<#ty>(v, ctx)
                    .map_err(|e| e.with_context(format!("{}::{} (prop '{}')", #rel_type, #key, #prop_key)))?,
                None => cyflow_core::decode::decode::<#ty>(cyflow_core::value::Value::Null, ctx)
                    .map_err(|_| cyflow_core::error::CyflowError::missing_property(
                        #prop_key,
                        <Self as cyflow_core::traits::CyflowRelation>::TYPE,
                    ))?,
            }
        });
    }

    Ok(quote! {
        impl cyflow_core::traits::CyflowRelation for #name {
            const TYPE: &'static str = #rel_type;
            const SOURCE_LABELS: &'static [&'static str] = &[#(#source_labels),*];
            const TARGET_LABELS: &'static [&'static str] = &[#(#target_labels),*];

            fn from_rel(
                rel: &cyflow_core::value::RelationshipCell,
                ctx: &cyflow_core::decode::DecodeContext,
            ) -> Result<Self, cyflow_core::error::CyflowError> {
                Ok(Self {
                    #(#inits,)*
                })
            }
        }

        impl cyflow_core::traits::FromCyflowValue for #name {
            const ENTITY: bool = true;

            fn from_value(
                value: cyflow_core::value::Value,
                ctx: &cyflow_core::decode::DecodeContext,
            ) -> Result<Self, cyflow_core::error::CyflowError> {
                match value {
                    cyflow_core::value::Value::Relationship(r) => {
                        <Self as cyflow_core::traits::CyflowRelation>::from_rel(&r, ctx)
                    }
                    other => Err(cyflow_core::error::CyflowError::type_mismatch(
                        "Relationship", cyflow_core::value::type_name(&other), #rel_type,
                    )),
                }
            }
        }
    })
}
