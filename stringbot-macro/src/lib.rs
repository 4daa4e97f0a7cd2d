use proc_macro::TokenStream;
use quote::quote;
use regex::Regex;
use syn::{LitStr, parse_macro_input, ItemFn};

extern crate proc_macro;

/// Bot command handler, usage:
/// `#[command("start")]`
///
/// Matches `/start`, `/start@SomeBot` and `/start with arguments`.
#[proc_macro_attribute]
pub fn command(metadata: TokenStream, input: TokenStream) -> TokenStream {
    let name = parse_macro_input!(metadata as LitStr);
    let input_fn = parse_macro_input!(input as ItemFn);

    // Telegram only accepts lowercase latin, digits and underscores
    let valid = Regex::new("^[a-z0-9_]{1,32}$").unwrap();
    if !valid.is_match(&name.value()) {
        return syn::Error::new(name.span(), "Invalid bot command name!")
            .to_compile_error()
            .into();
    }
    let pattern = format!(r"^/{}(@\w+)?(\s|$)", name.value());

    // Function name
    let ident = input_fn.sig.ident.clone();
    let out = quote! {
        #input_fn

        #[doc(hidden)]
        #[allow(non_camel_case_types)]
        pub struct #ident {}

        impl #ident {
            #[allow(non_snake_case, unreachable_patterns, unreachable_code)]
            fn info() -> ::std::vec::Vec<::stringbot::HandlerFilter> {
                ::std::vec![::stringbot::HandlerFilter::Regex(#pattern.to_string())]
            }
        }
    };

    TokenStream::from(out)
}
