use proc_macro::TokenStream;
use proc_macro2::{Delimiter, Spacing, TokenStream as TokenStream2, TokenTree};
use quote::quote;

enum Piece {
    Word(String),
    Punct(char, Spacing),
    Group(String, Delimiter),
}

impl Piece {
    fn text(&self) -> String {
        match self {
            Piece::Word(w) | Piece::Group(w, _) => w.clone(),
            Piece::Punct(c, _) => c.to_string(),
        }
    }
}

/// Upper-case words are clause keywords (`MATCH (n)`); anything else in
/// front of a parenthesis is a function call (`count(n)`).
fn is_keyword(word: &str) -> bool {
    word.chars().any(|c| c.is_ascii_alphabetic()) && !word.chars().any(|c| c.is_ascii_lowercase())
}

fn glued(prev: &Piece, next: &Piece) -> bool {
    use Delimiter::{Bracket, Parenthesis};
    match (prev, next) {
        (Piece::Punct(_, Spacing::Joint), _) => true,
        (_, Piece::Punct(',' | '.' | ':', _)) => true,
        (Piece::Punct('.' | '$' | ':', _), _) => true,
        // Relationship arrows: (a)-[:R]->(b), (a)<-[:R]-(b)
        (Piece::Punct('-' | '>', _), Piece::Group(_, Parenthesis | Bracket)) => true,
        (Piece::Group(_, Parenthesis | Bracket), Piece::Punct('-' | '<', _)) => true,
        (Piece::Word(w), Piece::Group(_, Parenthesis)) => !is_keyword(w),
        _ => false,
    }
}

/// Render tokens back to Cypher text, with the spacing a person would write
/// rather than the spacing `TokenStream::to_string()` produces.
pub fn render(stream: TokenStream2) -> String {
    let pieces: Vec<Piece> = stream
        .into_iter()
        .map(|tt| match tt {
            TokenTree::Ident(i) => Piece::Word(i.to_string()),
            TokenTree::Literal(l) => Piece::Word(l.to_string()),
            TokenTree::Punct(p) => Piece::Punct(p.as_char(), p.spacing()),
            TokenTree::Group(g) => {
                let inner = render(g.stream());
                let text = match g.delimiter() {
                    Delimiter::Parenthesis => format!("({inner})"),
                    Delimiter::Bracket => format!("[{inner}]"),
                    Delimiter::Brace => format!("{{{inner}}}"),
                    Delimiter::None => inner,
                };
                Piece::Group(text, g.delimiter())
            }
        })
        .collect();

    let mut out = String::new();
    for (i, piece) in pieces.iter().enumerate() {
        if i > 0 && !glued(&pieces[i - 1], piece) {
            out.push(' ');
        }
        out.push_str(&piece.text());
    }
    out
}

/// Convert a token stream like:
///   MATCH (n:Person)-[:KNOWS]->(f) RETURN f.name
/// into a `&'static str`.
pub fn expand(input: TokenStream) -> TokenStream {
    let out = render(input.into());
    quote! { #out }.into()
}
