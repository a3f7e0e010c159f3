//! `crud_context!` expansion

use convert_case::{Case, Casing};
use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::{
    Ident, Path, Token, Type,
    parse::{Parse, ParseStream},
};

/// `Context, Schema [, singular = ident] [, plural = ident] [, changeset = path]`
pub struct CrudContextInput {
    context: Type,
    schema: Path,
    singular: Option<Ident>,
    plural: Option<Ident>,
    changeset: Option<Path>,
}

impl Parse for CrudContextInput {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let context: Type = input.parse()?;
        input.parse::<Token![,]>()?;
        let schema: Path = input.parse()?;

        let mut singular = None;
        let mut plural = None;
        let mut changeset = None;

        while input.peek(Token![,]) {
            input.parse::<Token![,]>()?;
            if input.is_empty() {
                break;
            }

            let key: Ident = input.parse()?;
            input.parse::<Token![=]>()?;
            match key.to_string().as_str() {
                "singular" => singular = Some(input.parse()?),
                "plural" => plural = Some(input.parse()?),
                "changeset" => changeset = Some(input.parse()?),
                _ => {
                    return Err(syn::Error::new(
                        key.span(),
                        "expected `singular`, `plural` or `changeset`",
                    ));
                }
            }
        }

        Ok(Self {
            context,
            schema,
            singular,
            plural,
            changeset,
        })
    }
}

pub fn expand(input: CrudContextInput) -> syn::Result<TokenStream> {
    let CrudContextInput {
        context,
        schema,
        singular,
        plural,
        changeset,
    } = input;

    let schema_ident = schema
        .segments
        .last()
        .map(|segment| segment.ident.clone())
        .ok_or_else(|| syn::Error::new_spanned(&schema, "expected a schema type"))?;

    let singular = singular
        .map(|ident| ident.to_string())
        .unwrap_or_else(|| schema_ident.to_string().to_case(Case::Snake));
    let plural = plural
        .map(|ident| ident.to_string())
        .unwrap_or_else(|| format!("{}s", singular));

    let list = format_ident!("list_{}", plural);
    let list_paginated = format_ident!("list_{}_paginated", plural);
    let count = format_ident!("count_{}", plural);
    let get = format_ident!("get_{}", singular);
    let get_or_fail = format_ident!("get_{}_or_fail", singular);
    let get_by = format_ident!("get_{}_by", singular);
    let get_by_or_fail = format_ident!("get_{}_by_or_fail", singular);
    let create = format_ident!("create_{}", singular);
    let create_or_fail = format_ident!("create_{}_or_fail", singular);
    let update = format_ident!("update_{}", singular);
    let update_or_fail = format_ident!("update_{}_or_fail", singular);
    let delete = format_ident!("delete_{}", singular);
    let delete_or_fail = format_ident!("delete_{}_or_fail", singular);
    let change = format_ident!("change_{}", singular);
    let new = format_ident!("new_{}", singular);

    let changeset_fn = match changeset {
        Some(path) => quote! { ::contextkit::ChangesetFn::<#schema>::Func(#path) },
        None => quote! { ::contextkit::ChangesetFn::<#schema>::Named("changeset") },
    };

    let repo = quote! { ::contextkit::orm::repository };
    let store = quote! { ::contextkit::Context::store(self) };
    let opts_ty = quote! { &[::contextkit::QueryOption] };
    let failure = quote! { ::core::result::Result<#schema, ::contextkit::Failure<#schema>> };

    Ok(quote! {
        impl #context {
            pub async fn #list(&self, opts: #opts_ty) -> ::contextkit::Result<::std::vec::Vec<#schema>> {
                #repo::list::<#schema>(#store, opts).await
            }

            pub async fn #list_paginated(
                &self,
                opts: #opts_ty,
            ) -> ::contextkit::Result<::contextkit::Pagination<#schema>> {
                #repo::list_paginated::<#schema>(#store, opts).await
            }

            pub async fn #count(&self, opts: #opts_ty) -> ::contextkit::Result<i64> {
                #repo::count::<#schema>(#store, opts).await
            }

            pub async fn #get(
                &self,
                id: impl ::core::convert::Into<::contextkit::SqlValue>,
                opts: #opts_ty,
            ) -> ::contextkit::Result<::core::option::Option<#schema>> {
                #repo::get::<#schema>(#store, id, opts).await
            }

            pub async fn #get_or_fail(
                &self,
                id: impl ::core::convert::Into<::contextkit::SqlValue>,
                opts: #opts_ty,
            ) -> ::contextkit::Result<#schema> {
                #repo::get_or_fail::<#schema>(#store, id, opts).await
            }

            pub async fn #get_by(
                &self,
                clauses: &[(&str, ::contextkit::SqlValue)],
                opts: #opts_ty,
            ) -> ::contextkit::Result<::core::option::Option<#schema>> {
                #repo::get_by::<#schema>(#store, clauses, opts).await
            }

            pub async fn #get_by_or_fail(
                &self,
                clauses: &[(&str, ::contextkit::SqlValue)],
                opts: #opts_ty,
            ) -> ::contextkit::Result<#schema> {
                #repo::get_by_or_fail::<#schema>(#store, clauses, opts).await
            }

            pub async fn #create(
                &self,
                target: impl ::core::convert::Into<::contextkit::Changeset<#schema>>,
                attrs: &::contextkit::Attrs,
            ) -> #failure {
                #repo::create(#store, target, #changeset_fn, attrs).await
            }

            pub async fn #create_or_fail(
                &self,
                target: impl ::core::convert::Into<::contextkit::Changeset<#schema>>,
                attrs: &::contextkit::Attrs,
            ) -> ::contextkit::Result<#schema> {
                #repo::create_or_fail(#store, target, #changeset_fn, attrs).await
            }

            pub async fn #update(
                &self,
                target: impl ::core::convert::Into<::contextkit::Changeset<#schema>>,
                attrs: &::contextkit::Attrs,
            ) -> #failure {
                #repo::update(#store, target, #changeset_fn, attrs).await
            }

            pub async fn #update_or_fail(
                &self,
                target: impl ::core::convert::Into<::contextkit::Changeset<#schema>>,
                attrs: &::contextkit::Attrs,
            ) -> ::contextkit::Result<#schema> {
                #repo::update_or_fail(#store, target, #changeset_fn, attrs).await
            }

            pub async fn #delete(
                &self,
                target: impl ::core::convert::Into<::contextkit::Changeset<#schema>>,
            ) -> #failure {
                #repo::delete(#store, target).await
            }

            pub async fn #delete_or_fail(
                &self,
                target: impl ::core::convert::Into<::contextkit::Changeset<#schema>>,
            ) -> ::contextkit::Result<#schema> {
                #repo::delete_or_fail(#store, target).await
            }

            pub fn #change(
                &self,
                target: impl ::core::convert::Into<::contextkit::Changeset<#schema>>,
                attrs: &::contextkit::Attrs,
            ) -> ::contextkit::Result<::contextkit::Changeset<#schema>> {
                #repo::change(target, #changeset_fn, attrs)
            }

            pub async fn #new(
                &self,
                attrs: &::contextkit::Attrs,
                opts: #opts_ty,
            ) -> ::contextkit::Result<#schema> {
                #repo::new::<#schema>(#store, attrs, opts).await
            }
        }
    })
}
