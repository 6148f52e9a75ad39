//! `#[derive(Notification)]`.
//!
//! | Attribute | Where | Effect |
//! |-----------|-------|--------|
//! | `observe_as(dyn A, dyn B)` | type | `Satisfies<dyn A>` via the type's own trait impl, plus a supertype route |
//! | `name = "..."` | type | overrides `Message::message_name` |
//! | `parent` | field | `Satisfies<Parent>` borrowing the field, a route to `Parent`, and every route of `Parent` lifted |

use proc_macro2::TokenStream;
use quote::quote;
use syn::parse::Parse;
use syn::{
    Attribute, Data, DeriveInput, Index, LitStr, Member, Token, Type, spanned::Spanned,
};

use crate::message::{Contract, message_impl};

#[derive(Default)]
struct NotificationAttrs {
    observe_as: Vec<Type>,
    name: Option<LitStr>,
}

struct ParentField {
    member: Member,
    ty: Type,
}

// ============================================================================
// Attribute parsing
// ============================================================================

fn parse_attrs(input: &DeriveInput) -> syn::Result<NotificationAttrs> {
    let mut attrs = NotificationAttrs::default();

    for attr in &input.attrs {
        if !attr.path().is_ident("notification") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("observe_as") {
                let content;
                syn::parenthesized!(content in meta.input);
                for ty in content.parse_terminated(Type::parse, Token![,])? {
                    if !matches!(ty, Type::TraitObject(_)) {
                        return Err(syn::Error::new(
                            ty.span(),
                            "observe_as expects trait objects such as `dyn AuditEvent`; \
                             mark a parent notification field with #[notification(parent)]",
                        ));
                    }
                    attrs.observe_as.push(ty);
                }
            } else if meta.path.is_ident("name") {
                attrs.name = Some(meta.value()?.parse()?);
            } else {
                return Err(meta.error("expected `observe_as(...)` or `name`"));
            }
            Ok(())
        })?;
    }

    Ok(attrs)
}

fn is_parent(attrs: &[Attribute]) -> syn::Result<bool> {
    let mut parent = false;
    for attr in attrs {
        if !attr.path().is_ident("notification") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("parent") {
                parent = true;
                Ok(())
            } else {
                Err(meta.error("expected `parent`"))
            }
        })?;
    }
    Ok(parent)
}

fn find_parent(input: &DeriveInput) -> syn::Result<Option<ParentField>> {
    let fields = match &input.data {
        Data::Struct(data) => &data.fields,
        Data::Enum(data) => {
            for variant in &data.variants {
                for field in &variant.fields {
                    if is_parent(&field.attrs)? {
                        return Err(syn::Error::new(
                            field.span(),
                            "#[notification(parent)] is only supported on struct fields",
                        ));
                    }
                }
            }
            return Ok(None);
        }
        Data::Union(_) => {
            return Err(syn::Error::new(
                input.span(),
                "Notification cannot be derived for unions",
            ));
        }
    };

    let mut parent: Option<ParentField> = None;
    for (index, field) in fields.iter().enumerate() {
        if !is_parent(&field.attrs)? {
            continue;
        }
        if parent.is_some() {
            return Err(syn::Error::new(
                field.span(),
                "only one field can be marked #[notification(parent)]",
            ));
        }
        let member = match &field.ident {
            Some(ident) => Member::Named(ident.clone()),
            None => Member::Unnamed(Index::from(index)),
        };
        parent = Some(ParentField {
            member,
            ty: field.ty.clone(),
        });
    }

    Ok(parent)
}

// ============================================================================
// Code generation
// ============================================================================

pub fn derive_notification(input: &DeriveInput) -> syn::Result<TokenStream> {
    let attrs = parse_attrs(input)?;
    let parent = find_parent(input)?;

    let ident = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let message = message_impl(input, Contract::Notification, attrs.name.as_ref());

    let observe_impls = attrs.observe_as.iter().map(|ty| {
        quote! {
            impl #impl_generics ::herald::Satisfies<#ty> for #ident #ty_generics #where_clause {
                fn upcast(&self) -> &(#ty + 'static) {
                    self
                }
            }
        }
    });

    let observe_routes = attrs.observe_as.iter().map(|ty| {
        quote!(::herald::Supertype::<Self>::of::<#ty>())
    });

    let (parent_impl, parent_route, parent_lifted) = match &parent {
        Some(ParentField { member, ty }) => (
            quote! {
                impl #impl_generics ::herald::Satisfies<#ty> for #ident #ty_generics #where_clause {
                    fn upcast(&self) -> &#ty {
                        &self.#member
                    }
                }
            },
            quote!(::herald::Supertype::<Self>::of::<#ty>(),),
            quote! {
                supertypes.extend(
                    <#ty as ::herald::Notification>::supertypes()
                        .into_iter()
                        .map(::herald::Supertype::lift),
                );
            },
        ),
        None => (quote!(), quote!(), quote!()),
    };

    Ok(quote! {
        #message

        #(#observe_impls)*

        #parent_impl

        impl #impl_generics ::herald::Notification for #ident #ty_generics #where_clause {
            #[allow(unused_mut)]
            fn supertypes() -> ::std::vec::Vec<::herald::Supertype<Self>> {
                let mut supertypes = ::std::vec![#parent_route #(#observe_routes),*];
                #parent_lifted
                supertypes
            }
        }
    })
}
