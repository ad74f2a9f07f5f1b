use proc_macro::TokenStream;
use quote::{quote, ToTokens};
use syn::{parse_macro_input, DeriveInput};

use crate::attrs::{for_each_entry, named_fields, str_value};

struct FieldInfo {
    flatten: bool,
    column: Option<String>,
}

fn parse_field(f: &syn::Field) -> syn::Result<FieldInfo> {
    let mut info = FieldInfo {
        flatten: false,
        column: None,
    };
    for_each_entry(&f.attrs, |meta| {
        if meta.path.is_ident("flatten") {
            info.flatten = true;
        } else if meta.path.is_ident("column") {
            info.column = str_value(meta)?;
        }
        Ok(())
    })?;
    Ok(info)
}

pub fn expand(input: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(input as DeriveInput);
    match expand_projection(&ast) {
        Ok(tokens) => tokens.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

fn expand_projection(ast: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &ast.ident;
    let fields = named_fields(ast, "FromCyflow")?;

    let struct_name = name.to_string();
    let mut members = Vec::new();
    let mut inits = Vec::new();

    for f in fields {
        let Some(ident) = f.ident.as_ref() else { continue };
        let ty = &f.ty;
        let info = parse_field(f)?;

        if info.flatten {
            members.push(quote! {
                out.extend(<#ty as cyflow_core::traits::FromCyflow>::members());
            });
            inits.push(quote! {
                #ident: <#ty as cyflow_core::traits::FromCyflow>::from_cells(cells, ctx)?
            });
            continue;
        }

        let column = info.column.unwrap_or_else(|| ident.to_string());
        let type_name = ty.to_token_stream().to_string();
        members.push(quote! {
            out.push(cyflow_core::traits::ProjectionMember { name: #column, type_name: #type_name });
        });
        inits.push(quote! {
            #ident: {
                let v = cells.next_cell(#column, #struct_name)?;
                cyflow_core::decode::decode::<#ty>(v, ctx)
                    .map_err(|e| e.with_context(format!("{}::{}", #struct_name, #column)))?
            }
        });
    }

    Ok(quote! {
        impl cyflow_core::traits::FromCyflow for #name {
            fn members() -> Vec<cyflow_core::traits::ProjectionMember> {
                let mut out = Vec::new();
                #(#members)*
                out
            }

            fn from_cells(
                cells: &mut cyflow_core::record::Cells<'_>,
                ctx: &cyflow_core::decode::DecodeContext,
            ) -> Result<Self, cyflow_core::error::CyflowError> {
                Ok(Self {
                    #(#inits,)*
                })
            }
        }
    })
}
