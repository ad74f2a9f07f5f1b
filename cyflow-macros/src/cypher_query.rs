//! `cypher_query!`: Cypher text plus the local variables its `$name`
//! references capture, as a `CypherFragment`.

use proc_macro::TokenStream;
use proc_macro2::{Ident, TokenStream as TokenStream2, TokenTree};
use quote::quote;

use crate::cypher::render;

/// Every `$ident` in `stream`, nested groups included, first occurrence only.
fn captures(stream: TokenStream2, found: &mut Vec<Ident>) {
    let mut tokens = stream.into_iter().peekable();
    while let Some(token) = tokens.next() {
        match token {
            TokenTree::Punct(p) if p.as_char() == '$' => {
                if let Some(TokenTree::Ident(ident)) = tokens.peek() {
                    if !found.iter().any(|f| f == ident) {
                        found.push(ident.clone());
                    }
                    tokens.next();
                }
            }
            TokenTree::Group(g) => captures(g.stream(), found),
            _ => {}
        }
    }
}

pub fn expand(input: TokenStream) -> TokenStream {
    let input: TokenStream2 = input.into();
    let text = render(input.clone());

    let mut params = Vec::new();
    captures(input, &mut params);
    let binds = params.iter().map(|ident| {
        let name = ident.to_string();
        quote! { .param(#name, #ident) }
    });

    quote! {
        ::cyflow::fragment::CypherFragment::new(#text) #(#binds)*
    }
    .into()
}
