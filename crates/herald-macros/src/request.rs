//! `#[derive(Request)]`.

use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, LitStr, Type, spanned::Spanned};

use crate::message::{Contract, message_impl};

#[derive(Default)]
struct RequestAttrs {
    response: Option<Type>,
    name: Option<LitStr>,
}

fn parse_attrs(input: &DeriveInput) -> syn::Result<RequestAttrs> {
    let mut attrs = RequestAttrs::default();

    for attr in &input.attrs {
        if !attr.path().is_ident("request") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("response") {
                attrs.response = Some(meta.value()?.parse()?);
            } else if meta.path.is_ident("name") {
                attrs.name = Some(meta.value()?.parse()?);
            } else {
                return Err(meta.error("expected `response` or `name`"));
            }
            Ok(())
        })?;
    }

    Ok(attrs)
}

pub fn derive_request(input: &DeriveInput) -> syn::Result<TokenStream> {
    if let Data::Union(_) = input.data {
        return Err(syn::Error::new(
            input.span(),
            "Request cannot be derived for unions",
        ));
    }

    let attrs = parse_attrs(input)?;
    let ident = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let response = attrs
        .response
        .map_or_else(|| quote!(::herald::Unit), |ty| quote!(#ty));

    let message = message_impl(input, Contract::Request, attrs.name.as_ref());

    Ok(quote! {
        #message

        impl #impl_generics ::herald::Request for #ident #ty_generics #where_clause {
            type Response = #response;
        }
    })
}
