extern crate proc_macro;

use proc_macro::TokenStream;
use proc_macro2::{Span, TokenStream as TokenStream2};
use quote::quote;
use syn::punctuated::Punctuated;
use syn::{parse_macro_input, DeriveInput, Expr, Fields, Ident, Lit, Token};

/// Derive macro implementing `shopkit::error::HttpError` for an error enum
///
/// Each variant that should map to an HTTP response carries `#[http_error(...)]`:
/// - status code (required), either a `StatusCode` constant (`BAD_REQUEST`) or a number (`400`)
/// - user-facing message (optional), a string literal with basic interpolation
///
/// Without a message the `Display` implementation is used, so `thiserror` messages
/// double as response messages unless overridden.
///
/// Tuple variants interpolate by index (`"got {0}"`), struct variants by field name
/// (`"got {field}"`).
///
/// A single field per variant may be marked `#[http_details]`. It must be a `Vec<String>`
/// and becomes the `errors` list of the response envelope.
///
/// ```rust,ignore
/// #[derive(Debug, thiserror::Error, shopkit::HttpError)]
/// enum Error {
///     #[error("invalid request body")]
///     #[http_error(BAD_REQUEST, "Invalid request body")]
///     Validation(#[http_details] Vec<String>),
///
///     #[error("user already exists")]
///     #[http_error(409, "User already exists")]
///     UserExists,
///
///     #[error("database error: {0}")]
///     #[http_error(INTERNAL_SERVER_ERROR, "an internal server error occurred")]
///     Database(#[from] sqlx::Error),
/// }
/// ```
#[proc_macro_derive(HttpError, attributes(http_error, http_details))]
pub fn http_error_derive(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

struct VariantSpec {
    ident: Ident,
    code: TokenStream2,
    message: Option<String>,
    fields: Fields,
}

fn expand(input: DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let syn::Data::Enum(data_enum) = input.data else {
        return Err(syn::Error::new_spanned(
            name,
            "HttpError can only be derived for enums",
        ));
    };

    let mut variants = Vec::new();
    for variant in data_enum.variants {
        let mut code = None;
        let mut message = None;

        for attr in variant.attrs.iter().filter(|a| a.path().is_ident("http_error")) {
            let args = attr.parse_args_with(Punctuated::<Expr, Token![,]>::parse_terminated)?;
            for (i, expr) in args.into_iter().enumerate() {
                match (i, expr) {
                    (0, Expr::Path(path)) => {
                        let path = path.path;
                        code = Some(quote! { ::shopkit::http::StatusCode::#path });
                    }
                    (0, Expr::Lit(lit)) => match lit.lit {
                        Lit::Int(int_lit) => {
                            let value = int_lit.base10_parse::<u16>()?;
                            if !(100..1000).contains(&value) {
                                return Err(syn::Error::new_spanned(
                                    int_lit,
                                    "status code must be between 100 and 999",
                                ));
                            }
                            code = Some(quote! {
                                ::shopkit::http::StatusCode::from_u16(#value)
                                    .unwrap_or(::shopkit::http::StatusCode::INTERNAL_SERVER_ERROR)
                            });
                        }
                        other => {
                            return Err(syn::Error::new_spanned(other, "expected a status code"))
                        }
                    },
                    (1, Expr::Lit(lit)) => match lit.lit {
                        Lit::Str(str_lit) => message = Some(str_lit.value()),
                        other => {
                            return Err(syn::Error::new_spanned(other, "expected a string message"))
                        }
                    },
                    (_, other) => {
                        return Err(syn::Error::new_spanned(
                            other,
                            "expected `#[http_error(CODE)]` or `#[http_error(CODE, \"message\")]`",
                        ))
                    }
                }
            }
        }

        let Some(code) = code else {
            return Err(syn::Error::new_spanned(
                &variant.ident,
                "missing #[http_error(...)] attribute",
            ));
        };

        variants.push(VariantSpec {
            ident: variant.ident,
            code,
            message,
            fields: variant.fields,
        });
    }

    let code_arms = variants.iter().map(|v| {
        let ident = &v.ident;
        let code = &v.code;
        match v.fields {
            Fields::Unit => quote! { Self::#ident => #code, },
            Fields::Unnamed(_) => quote! { Self::#ident(..) => #code, },
            Fields::Named(_) => quote! { Self::#ident { .. } => #code, },
        }
    });

    let message_arms = variants.iter().map(message_arm);

    let mut details_arms = Vec::new();
    for v in &variants {
        if let Some(arm) = details_arm(v)? {
            details_arms.push(arm);
        }
    }

    let details_fn = if details_arms.is_empty() {
        quote! {}
    } else {
        quote! {
            #[allow(unreachable_patterns)]
            fn http_details(&self) -> ::std::vec::Vec<::std::string::String> {
                match self {
                    #(#details_arms)*
                    _ => ::std::vec::Vec::new(),
                }
            }
        }
    };

    Ok(quote! {
        impl #impl_generics ::shopkit::error::HttpError for #name #ty_generics #where_clause {
            fn http_code(&self) -> ::shopkit::http::StatusCode {
                match self {
                    #(#code_arms)*
                }
            }

            fn http_message(&self) -> ::std::string::String {
                match self {
                    #(#message_arms)*
                }
            }

            #details_fn
        }
    })
}

fn message_arm(v: &VariantSpec) -> TokenStream2 {
    let ident = &v.ident;
    match &v.fields {
        Fields::Unit => {
            let expr = match &v.message {
                Some(msg) => quote! { #msg.to_string() },
                None => quote! { self.to_string() },
            };
            quote! { Self::#ident => #expr, }
        }
        Fields::Unnamed(fields) => {
            let names: Vec<Ident> = (0..fields.unnamed.len()).map(tuple_binding).collect();
            let expr = match &v.message {
                Some(msg) => {
                    let msg = prefix_numbers_in_braces(msg);
                    quote! { format!(#msg) }
                }
                None => quote! { self.to_string() },
            };
            quote! {
                #[allow(unused_variables)]
                Self::#ident(#(#names),*) => #expr,
            }
        }
        Fields::Named(fields) => {
            let names: Vec<&Ident> = fields.named.iter().filter_map(|f| f.ident.as_ref()).collect();
            let expr = match &v.message {
                Some(msg) => quote! { format!(#msg) },
                None => quote! { self.to_string() },
            };
            quote! {
                #[allow(unused_variables)]
                Self::#ident { #(#names),* } => #expr,
            }
        }
    }
}

fn details_arm(v: &VariantSpec) -> syn::Result<Option<TokenStream2>> {
    let ident = &v.ident;
    let marked = |attrs: &[syn::Attribute]| attrs.iter().any(|a| a.path().is_ident("http_details"));

    match &v.fields {
        Fields::Unit => Ok(None),
        Fields::Unnamed(fields) => {
            let mut found = fields.unnamed.iter().enumerate().filter(|(_, f)| marked(&f.attrs));
            let Some((index, _)) = found.next() else {
                return Ok(None);
            };
            if let Some((_, extra)) = found.next() {
                return Err(syn::Error::new_spanned(extra, "only one #[http_details] field allowed"));
            }
            let patterns = (0..fields.unnamed.len()).map(|i| {
                if i == index {
                    let binding = tuple_binding(i);
                    quote! { #binding }
                } else {
                    quote! { _ }
                }
            });
            let binding = tuple_binding(index);
            Ok(Some(quote! { Self::#ident(#(#patterns),*) => #binding.clone(), }))
        }
        Fields::Named(fields) => {
            let mut found = fields.named.iter().filter(|f| marked(&f.attrs));
            let Some(field) = found.next() else {
                return Ok(None);
            };
            if let Some(extra) = found.next() {
                return Err(syn::Error::new_spanned(extra, "only one #[http_details] field allowed"));
            }
            let name = &field.ident;
            Ok(Some(quote! { Self::#ident { #name, .. } => #name.clone(), }))
        }
    }
}

fn tuple_binding(i: usize) -> Ident {
    Ident::new(&format!("__self_{}", i), Span::call_site())
}

// Rewrites positional placeholders ("{0}") to the generated tuple bindings ("{__self_0}")
fn prefix_numbers_in_braces(input: &str) -> String {
    let mut result = String::new();
    let mut inside_braces = false;
    let mut at_start = false;

    for c in input.chars() {
        match c {
            '{' => {
                inside_braces = true;
                at_start = true;
                result.push(c);
            }
            '}' => {
                inside_braces = false;
                result.push(c);
            }
            _ if inside_braces && at_start && c.is_ascii_digit() => {
                result.push_str("__self_");
                result.push(c);
                at_start = false;
            }
            _ => {
                at_start = false;
                result.push(c);
            }
        }
    }

    result
}
