#![forbid(unsafe_code)]

extern crate proc_macro;

use proc_macro::TokenStream;
use quote::quote;

/// Derive `pgcall::ToStorage` for a struct with named fields.
///
/// The storage representation is a `Value::Object` keyed by field name.
/// Every field type must convert into `pgcall::Value` via `From`.
#[proc_macro_derive(ToStorage)]
pub fn derive_to_storage(input: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(input as syn::DeriveInput);
    let ident = &input.ident;

    let fields = match &input.data {
        syn::Data::Struct(syn::DataStruct {
            fields: syn::Fields::Named(named),
            ..
        }) => &named.named,
        _ => {
            return syn::Error::new_spanned(
                ident,
                "ToStorage can only be derived for structs with named fields",
            )
            .to_compile_error()
            .into();
        }
    };

    let inserts = fields.iter().map(|field| {
        let name = field.ident.as_ref().unwrap();
        let key = name.to_string();
        quote! {
            object.insert(#key.to_string(), ::pgcall::Value::from(self.#name.clone()));
        }
    });

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let tokens = quote! {
        impl #impl_generics ::pgcall::ToStorage for #ident #ty_generics #where_clause {
            fn to_storage(&self) -> ::pgcall::Value {
                let mut object = ::std::collections::HashMap::new();
                #(#inserts)*
                ::pgcall::Value::Object(object)
            }
        }
    };

    TokenStream::from(tokens)
}
