//! `Message` impl shared by both derives.

use proc_macro2::TokenStream;
use quote::quote;
use syn::{DeriveInput, LitStr};

/// Which contract the generated `Message` impl advertises.
pub enum Contract {
    Request,
    Notification,
}

pub fn message_impl(input: &DeriveInput, contract: Contract, name: Option<&LitStr>) -> TokenStream {
    let ident = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let name_impl = name.map(|name| {
        quote! {
            fn message_name(&self) -> &'static str {
                #name
            }
        }
    });

    let descriptor_impl = match contract {
        Contract::Request => quote! {
            fn request_descriptor(&self) -> ::core::option::Option<::herald::RequestDescriptor> {
                ::core::option::Option::Some(::herald::RequestDescriptor::of::<Self>())
            }
        },
        Contract::Notification => quote! {
            fn notification_descriptor(
                &self,
            ) -> ::core::option::Option<::herald::NotificationDescriptor> {
                ::core::option::Option::Some(::herald::NotificationDescriptor::of::<Self>())
            }
        },
    };

    quote! {
        impl #impl_generics ::herald::Message for #ident #ty_generics #where_clause {
            #name_impl

            fn as_any(&self) -> &dyn ::core::any::Any {
                self
            }

            #descriptor_impl
        }
    }
}
