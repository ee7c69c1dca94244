use proc_macro::TokenStream;
use quote::quote;
use syn::{DeriveInput, LitStr, parse_macro_input};

/// Implements `coil_base::ConfigSection` with the given key.
///
/// ```ignore
/// #[config_section("database")]
/// #[derive(Deserialize)]
/// struct DatabaseConfig {
///     host: String,
/// }
/// ```
#[proc_macro_attribute]
pub fn config_section(args: TokenStream, input: TokenStream) -> TokenStream {
    let key = parse_macro_input!(args as LitStr);
    let item = parse_macro_input!(input as DeriveInput);

    if key.value().is_empty() {
        return syn::Error::new(key.span(), "config section key must not be empty")
            .to_compile_error()
            .into();
    }

    let name = &item.ident;
    let (impl_generics, ty_generics, where_clause) = item.generics.split_for_impl();

    let expanded = quote! {
        #item

        impl #impl_generics ::coil_base::ConfigSection for #name #ty_generics #where_clause {
            fn key() -> &'static str {
                #key
            }
        }
    };

    TokenStream::from(expanded)
}
