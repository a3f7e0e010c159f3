//! `#[derive(Schema)]` expansion

use convert_case::{Case, Casing};
use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::{
    Data, DeriveInput, Fields, GenericArgument, Ident, LitStr, PathArguments, Type,
    spanned::Spanned,
};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Kind {
    Integer,
    Real,
    Text,
    Boolean,
    Json,
}

impl Kind {
    fn parse(lit: &LitStr) -> syn::Result<Self> {
        match lit.value().as_str() {
            "integer" => Ok(Kind::Integer),
            "real" => Ok(Kind::Real),
            "text" => Ok(Kind::Text),
            "boolean" => Ok(Kind::Boolean),
            "json" => Ok(Kind::Json),
            other => Err(syn::Error::new(
                lit.span(),
                format!("unknown column kind `{}` (integer, real, text, boolean, json)", other),
            )),
        }
    }

    fn tokens(self) -> TokenStream {
        let variant = match self {
            Kind::Integer => format_ident!("Integer"),
            Kind::Real => format_ident!("Real"),
            Kind::Text => format_ident!("Text"),
            Kind::Boolean => format_ident!("Boolean"),
            Kind::Json => format_ident!("Json"),
        };
        quote! { ::contextkit::FieldKind::#variant }
    }
}

#[derive(Clone, Copy)]
enum Relation {
    HasMany,
    HasOne,
    BelongsTo,
}

struct Column {
    name: String,
    kind: Kind,
    nullable: bool,
}

struct Assoc {
    name: String,
    relation: Relation,
    related: Type,
    foreign_key: Option<String>,
    references: Option<String>,
}

#[derive(Default)]
struct SchemaAttrs {
    table: Option<String>,
    primary_key: Option<String>,
    key: Option<LitStr>,
    lock: Option<String>,
    timestamps: bool,
    changesets: Vec<Ident>,
}

pub fn expand(input: DeriveInput) -> syn::Result<TokenStream> {
    let ident = &input.ident;

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new(
            input.generics.span(),
            "Schema cannot be derived for generic types",
        ));
    }

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            _ => {
                return Err(syn::Error::new(
                    ident.span(),
                    "Schema requires a struct with named fields",
                ));
            }
        },
        _ => return Err(syn::Error::new(ident.span(), "Schema requires a struct")),
    };

    let attrs = parse_schema_attrs(&input)?;
    let snake = ident.to_string().to_case(Case::Snake);

    let mut columns = Vec::new();
    let mut assocs = Vec::new();

    for field in fields {
        let Some(field_ident) = &field.ident else {
            continue;
        };
        let name = field_ident.to_string().trim_start_matches("r#").to_string();

        let mut kind = None;
        let mut skip = false;
        let mut assoc = None;

        for attr in &field.attrs {
            let relation = if attr.path().is_ident("has_many") {
                Some(Relation::HasMany)
            } else if attr.path().is_ident("has_one") {
                Some(Relation::HasOne)
            } else if attr.path().is_ident("belongs_to") {
                Some(Relation::BelongsTo)
            } else {
                None
            };

            if let Some(relation) = relation {
                let mut foreign_key = None;
                let mut references = None;
                if matches!(attr.meta, syn::Meta::List(_)) {
                    attr.parse_nested_meta(|meta| {
                        if meta.path.is_ident("foreign_key") {
                            foreign_key = Some(meta.value()?.parse::<LitStr>()?.value());
                            Ok(())
                        } else if meta.path.is_ident("references") {
                            references = Some(meta.value()?.parse::<LitStr>()?.value());
                            Ok(())
                        } else {
                            Err(meta.error("expected `foreign_key` or `references`"))
                        }
                    })?;
                }
                let related = related_type(&field.ty, relation)?;
                assoc = Some(Assoc {
                    name: name.clone(),
                    relation,
                    related,
                    foreign_key,
                    references,
                });
            } else if attr.path().is_ident("schema") {
                attr.parse_nested_meta(|meta| {
                    if meta.path.is_ident("kind") {
                        kind = Some(Kind::parse(&meta.value()?.parse::<LitStr>()?)?);
                        Ok(())
                    } else if meta.path.is_ident("skip") {
                        skip = true;
                        Ok(())
                    } else {
                        Err(meta.error("expected `kind = \"...\"` or `skip`"))
                    }
                })?;
            }
        }

        if let Some(assoc) = assoc {
            assocs.push(assoc);
            continue;
        }
        if skip {
            continue;
        }

        let (inner, nullable) = unwrap_option(&field.ty);
        columns.push(Column {
            name,
            kind: kind.unwrap_or_else(|| infer_kind(inner)),
            nullable,
        });
    }

    let table = attrs.table.unwrap_or_else(|| format!("{}s", snake));
    let primary_key = attrs.primary_key.unwrap_or_else(|| "id".to_string());

    let pk_kind = columns
        .iter()
        .find(|c| c.name == primary_key)
        .map(|c| c.kind)
        .ok_or_else(|| {
            syn::Error::new(
                ident.span(),
                format!("primary key `{}` is not a column of this struct", primary_key),
            )
        })?;

    let key_strategy = match &attrs.key {
        Some(lit) => match lit.value().as_str() {
            "autoincrement" => quote! { ::contextkit::KeyStrategy::Autoincrement },
            "uuid" => quote! { ::contextkit::KeyStrategy::Uuid },
            "manual" => quote! { ::contextkit::KeyStrategy::Manual },
            other => {
                return Err(syn::Error::new(
                    lit.span(),
                    format!("unknown key strategy `{}` (autoincrement, uuid, manual)", other),
                ));
            }
        },
        None if pk_kind == Kind::Integer => quote! { ::contextkit::KeyStrategy::Autoincrement },
        None => quote! { ::contextkit::KeyStrategy::Uuid },
    };

    let field_defs = columns.iter().map(|column| {
        let name = &column.name;
        let kind = column.kind.tokens();
        if column.nullable && column.name != primary_key {
            quote! { ::contextkit::FieldDef::nullable(#name, #kind) }
        } else {
            quote! { ::contextkit::FieldDef::new(#name, #kind) }
        }
    });

    let association_defs = assocs.iter().map(|assoc| {
        let name = &assoc.name;
        let related = &assoc.related;
        let (cardinality, owner_key, related_key) = match assoc.relation {
            Relation::HasMany | Relation::HasOne => {
                let owner_key = assoc.references.clone().unwrap_or_else(|| primary_key.clone());
                let related_key = assoc
                    .foreign_key
                    .clone()
                    .unwrap_or_else(|| format!("{}_id", snake));
                let cardinality = if matches!(assoc.relation, Relation::HasMany) {
                    quote! { ::contextkit::Cardinality::Many }
                } else {
                    quote! { ::contextkit::Cardinality::One }
                };
                (cardinality, owner_key, related_key)
            }
            Relation::BelongsTo => {
                let owner_key = assoc
                    .foreign_key
                    .clone()
                    .unwrap_or_else(|| format!("{}_id", name));
                let related_key = assoc.references.clone().unwrap_or_else(|| "id".to_string());
                (quote! { ::contextkit::Cardinality::One }, owner_key, related_key)
            }
        };
        quote! {
            ::contextkit::Association {
                name: #name,
                cardinality: #cardinality,
                owner_key: #owner_key,
                related_key: #related_key,
                related: <#related as ::contextkit::Schema>::source,
            }
        }
    });

    let lock_field = match &attrs.lock {
        Some(lock) => quote! { ::core::option::Option::Some(#lock) },
        None => quote! { ::core::option::Option::None },
    };
    let timestamps = attrs.timestamps;

    let changeset_arms = attrs.changesets.iter().map(|func| {
        let name = func.to_string();
        quote! {
            #name => ::core::option::Option::Some(Self::#func as ::contextkit::ChangesetFnPtr<Self>),
        }
    });

    Ok(quote! {
        impl ::contextkit::Schema for #ident {
            fn source() -> &'static ::contextkit::Source {
                static SOURCE: ::contextkit::Source = ::contextkit::Source {
                    table: #table,
                    primary_key: #primary_key,
                    key_strategy: #key_strategy,
                    fields: &[#(#field_defs),*],
                    associations: &[#(#association_defs),*],
                    lock_field: #lock_field,
                    timestamps: #timestamps,
                };
                &SOURCE
            }

            fn changeset_named(name: &str) -> ::core::option::Option<::contextkit::ChangesetFnPtr<Self>> {
                match name {
                    #(#changeset_arms)*
                    _ => ::core::option::Option::None,
                }
            }
        }
    })
}

fn parse_schema_attrs(input: &DeriveInput) -> syn::Result<SchemaAttrs> {
    let mut attrs = SchemaAttrs::default();

    for attr in &input.attrs {
        if !attr.path().is_ident("schema") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("table") {
                attrs.table = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if meta.path.is_ident("primary_key") {
                attrs.primary_key = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if meta.path.is_ident("key") {
                attrs.key = Some(meta.value()?.parse::<LitStr>()?);
            } else if meta.path.is_ident("lock") {
                attrs.lock = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if meta.path.is_ident("timestamps") {
                attrs.timestamps = true;
            } else if meta.path.is_ident("changesets") {
                meta.parse_nested_meta(|inner| {
                    let func = inner
                        .path
                        .get_ident()
                        .cloned()
                        .ok_or_else(|| inner.error("expected a function name"))?;
                    attrs.changesets.push(func);
                    Ok(())
                })?;
            } else {
                return Err(meta.error("unsupported schema attribute"));
            }
            Ok(())
        })?;
    }

    Ok(attrs)
}

/// `Option<T>` gives `(T, true)`, anything else `(ty, false)`.
fn unwrap_option(ty: &Type) -> (&Type, bool) {
    match single_generic(ty, "Option") {
        Some(inner) => (inner, true),
        None => (ty, false),
    }
}

fn single_generic<'a>(ty: &'a Type, wrapper: &str) -> Option<&'a Type> {
    let Type::Path(path) = ty else {
        return None;
    };
    let segment = path.path.segments.last()?;
    if segment.ident != wrapper {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    match args.args.first()? {
        GenericArgument::Type(inner) => Some(inner),
        _ => None,
    }
}

fn related_type(ty: &Type, relation: Relation) -> syn::Result<Type> {
    let inner = match relation {
        Relation::HasMany => single_generic(ty, "Vec"),
        Relation::HasOne | Relation::BelongsTo => {
            let (inner, _) = unwrap_option(ty);
            single_generic(inner, "Box").or(Some(inner))
        }
    };
    inner.cloned().ok_or_else(|| {
        syn::Error::new(
            ty.span(),
            "has_many fields must be `Vec<T>` where T implements Schema",
        )
    })
}

fn infer_kind(ty: &Type) -> Kind {
    let Type::Path(path) = ty else {
        return Kind::Json;
    };
    let Some(segment) = path.path.segments.last() else {
        return Kind::Json;
    };

    match segment.ident.to_string().as_str() {
        "i8" | "i16" | "i32" | "i64" | "u8" | "u16" | "u32" | "u64" | "isize" | "usize" => {
            Kind::Integer
        }
        "f32" | "f64" => Kind::Real,
        "bool" => Kind::Boolean,
        "Vec" | "HashMap" | "BTreeMap" | "HashSet" | "BTreeSet" | "Value" => Kind::Json,
        _ => Kind::Text,
    }
}
