//! Attribute macro that registers a background extractor in the global registry at program start.
//!
//! ```ignore
//! #[register_extractor]
//! #[derive(Clone, Debug)]
//! pub struct MyExtractor;
//! ```
//! expands to the struct itself plus a `#[ctor]` function calling
//! `ExtractorRegistry::register_extractor::<MyExtractor>()`.

extern crate proc_macro;
use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, ItemStruct};

#[proc_macro_attribute]
pub fn register_extractor(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemStruct);
    let struct_name = &input.ident;

    let fn_name_str = heck::ToSnakeCase::to_snake_case(struct_name.to_string().as_str());
    let fn_name = syn::Ident::new(
        &format!("register_extractor_{}", fn_name_str),
        struct_name.span(),
    );

    let expanded = quote! {
        #input

        #[ctor::ctor]
        fn #fn_name() {
            crate::background::extractor::ExtractorRegistry::register_extractor::<#struct_name>();
        }
    };

    TokenStream::from(expanded)
}
