use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, DeriveInput};

use crate::attrs::{for_each_entry, named_fields, str_value};

enum Source {
    Property(String),
    Id,
    Skip,
}

fn get_label(ast: &DeriveInput) -> syn::Result<String> {
    let mut label = None;
    for_each_entry(&ast.attrs, |meta| {
        if meta.path.is_ident("label") {
            label = str_value(meta)?;
        }
        Ok(())
    })?;
    Ok(label.unwrap_or_else(|| ast.ident.to_string()))
}

fn field_source(f: &syn::Field, key: &str) -> syn::Result<Source> {
    let mut source = Source::Property(key.to_owned());
    for_each_entry(&f.attrs, |meta| {
        if meta.path.is_ident("id") {
            source = Source::Id;
        } else if meta.path.is_ident("skip") {
            source = Source::Skip;
        } else if meta.path.is_ident("prop") {
            if let Some(p) = str_value(meta)? {
                source = Source::Property(p);
            }
        }
        Ok(())
    })?;
    Ok(source)
}

pub fn expand(input: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(input as DeriveInput);
    match expand_node(&ast) {
        Ok(tokens) => tokens.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

fn expand_node(ast: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &ast.ident;
    let label = get_label(ast)?;
    let fields = named_fields(ast, "CyflowNode")?;

    let mut inits = Vec::new();
    let mut properties = Vec::new();

    for f in fields {
        let Some(ident) = f.ident.as_ref() else { continue };
        let key = ident.to_string();
        let ty = &f.ty;

        match field_source(f, &key)? {
            Source::Skip => inits.push(quote! {
                #ident: ::std::default::Default::default()
            }),
            Source::Id => inits.push(quote! {
                #ident: cyflow_core::decode::decode::<#ty>(cyflow_core::value::Value::Integer(node.id), ctx)
                    .map_err(|e| e.with_context(format!("{}::{} (id)", #label, #key)))?
            }),
            Source::Property(prop_key) => {
                // A missing property reads as null; types without a null default report it missing.
                inits.push(quote! {
                    #ident: match cyflow_core::props::node_prop(node, #prop_key) {
                        Some(v) => cyflow_core::decode::decode::<#ty>(v, ctx)
                            .map_err(|e| e.with_context(format!("{}::{} (prop '{}')", #label, #key, #prop_key)))?,
                        None => cyflow_core::decode::decode::<#ty>(cyflow_core::value::Value::Null, ctx)
                            .map_err(|_| cyflow_core::error::CyflowError::missing_property(
                                #prop_key,
                                <Self as cyflow_core::traits::CyflowNode>::LABEL,
                            ))?,
                    }
                });
                properties.push(prop_key);
            }
        }
    }

    Ok(quote! {
        impl cyflow_core::traits::CyflowNode for #name {
            const LABEL: &'static str = #label;
            const PROPERTIES: &'static [&'static str] = &[#(#properties),*];

            fn from_node(
                node: &cyflow_core::value::NodeCell,
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
                    cyflow_core::value::Value::Node(n) => <Self as cyflow_core::traits::CyflowNode>::from_node(&n, ctx),
                    other => Err(cyflow_core::error::CyflowError::type_mismatch(
                        "Node", cyflow_core::value::type_name(&other), #label,
                    )),
                }
            }
        }
    })
}
