use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields};

use crate::attrs::{for_each_entry, str_value};

pub fn expand(input: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(input as DeriveInput);
    match expand_enum(&ast) {
        Ok(tokens) => tokens.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

fn expand_enum(ast: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &ast.ident;
    let enum_name = name.to_string();

    let Data::Enum(data) = &ast.data else {
        return Err(syn::Error::new_spanned(ast, "CyflowEnum only supports enums"));
    };

    let mut idents = Vec::new();
    let mut names = Vec::new();
    for v in &data.variants {
        if !matches!(v.fields, Fields::Unit) {
            return Err(syn::Error::new_spanned(v, "CyflowEnum only supports unit variants"));
        }
        let mut stored = v.ident.to_string();
        for_each_entry(&v.attrs, |meta| {
            if meta.path.is_ident("rename") {
                if let Some(r) = str_value(meta)? {
                    stored = r;
                }
            }
            Ok(())
        })?;
        idents.push(&v.ident);
        names.push(stored);
    }

    Ok(quote! {
        impl cyflow_core::traits::CyflowEnum for #name {
            const NAME: &'static str = #enum_name;
            const VARIANTS: &'static [&'static str] = &[#(#names),*];

            fn from_name(name: &str) -> Option<Self> {
                match name {
                    #(#names => Some(Self::#idents),)*
                    _ => None,
                }
            }

            fn name(&self) -> &'static str {
                match self {
                    #(Self::#idents => #names,)*
                }
            }
        }

        impl cyflow_core::traits::FromCyflowValue for #name {
            const KIND: cyflow_core::traits::TargetKind = cyflow_core::traits::TargetKind::Enum {
                name: #enum_name,
                variants: <Self as cyflow_core::traits::CyflowEnum>::VARIANTS,
            };

            fn from_value(
                value: cyflow_core::value::Value,
                _ctx: &cyflow_core::decode::DecodeContext,
            ) -> Result<Self, cyflow_core::error::CyflowError> {
                match value {
                    cyflow_core::value::Value::String(s) => {
                        <Self as cyflow_core::traits::CyflowEnum>::from_name(&s).ok_or_else(|| {
                            cyflow_core::error::CyflowError::Mapping(format!(
                                "'{}' is not a variant of {}", s, #enum_name,
                            ))
                        })
                    }
                    other => Err(cyflow_core::error::CyflowError::type_mismatch(
                        "String", cyflow_core::value::type_name(&other), #enum_name,
                    )),
                }
            }
        }

        impl ::std::convert::From<#name> for cyflow_core::value::Value {
            fn from(v: #name) -> Self {
                cyflow_core::value::Value::String(
                    <#name as cyflow_core::traits::CyflowEnum>::name(&v).to_owned(),
                )
            }
        }
    })
}
