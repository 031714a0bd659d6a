use proc_macro::TokenStream;
use quote::quote_spanned;
use syn::{parse_macro_input, spanned::Spanned, ItemFn};

/// Wraps a `poise::command` so the returned command carries a `crate::util::Spanned`
/// with its name and definition site in `custom_data`.
///
/// Must be placed above `#[poise::command]`.
#[proc_macro_attribute]
pub fn inject_span(_args: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemFn);

    let fn_name = input.sig.ident.clone();
    let vis = input.vis.clone();
    let name = fn_name.to_string();

    let span = input.span();

    let output: proc_macro2::TokenStream = quote_spanned! { span =>
        #vis fn #fn_name() -> ::poise::Command<
            <crate::Context<'static> as ::poise::_GetGenerics>::U,
            <crate::Context<'static> as ::poise::_GetGenerics>::E,
        > {
            let file_loc = file!();
            let line_no = line!();

            #input

            let mut command = #fn_name();
            command.custom_data = Box::new(crate::util::Spanned {
                name: #name,
                file: file_loc,
                line: line_no,
                inner: command.custom_data,
            }) as Box<dyn ::std::any::Any + ::std::marker::Send + ::std::marker::Sync + 'static>;
            command
        }
    };

    proc_macro::TokenStream::from(output)
}
