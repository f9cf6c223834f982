use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    parse_macro_input, punctuated::Punctuated, spanned::Spanned, Attribute, Data, DeriveInput,
    Expr, Fields, GenericArgument, Lit, LitStr, Meta, PathArguments, Token, Type,
};

/// Expand #[derive(Component)].
pub fn expand_component(item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as DeriveInput);

    match expand_component_impl(input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand_component_impl(input: DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => fields.named.iter().collect::<Vec<_>>(),
            Fields::Unit => Vec::new(),
            Fields::Unnamed(_) => {
                return Err(syn::Error::new(
                    input.span(),
                    "Only named fields are supported",
                ))
            }
        },
        _ => return Err(syn::Error::new(input.span(), "Only structs are supported")),
    };

    let struct_attrs = parse_component_attrs(&input.attrs)?;
    let description = struct_attrs.description.unwrap_or_default();

    let mut field_schemas = Vec::new();
    for field in fields {
        let field_attrs = parse_component_attrs(&field.attrs)?;
        let serde_attrs = parse_serde_attrs(&field.attrs)?;
        if field_attrs.skip || serde_attrs.skip {
            continue;
        }

        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        let name = serde_attrs
            .rename
            .unwrap_or_else(|| ident.to_string().trim_start_matches("r#").to_string());
        let field_type = json_type(&field.ty);
        let rules: Vec<String> = field_attrs
            .validate
            .as_deref()
            .map(split_rules)
            .unwrap_or_default();
        let field_description = field_attrs.description.unwrap_or_default();

        field_schemas.push(quote! {
            ::drip_core::component::FieldSchema::new(#name, #field_type)
                .with_validations(&[#(#rules),*])
                .with_description(#field_description)
        });
    }

    Ok(quote! {
        impl #impl_generics ::drip_core::component::Component for #struct_name #ty_generics #where_clause {
            fn description() -> &'static str {
                #description
            }

            fn fields() -> ::std::vec::Vec<::drip_core::component::FieldSchema> {
                ::std::vec![#(#field_schemas),*]
            }
        }
    })
}

#[derive(Default)]
struct ComponentAttrs {
    description: Option<String>,
    validate: Option<String>,
    skip: bool,
}

fn parse_component_attrs(attrs: &[Attribute]) -> syn::Result<ComponentAttrs> {
    let mut result = ComponentAttrs::default();

    for attr in attrs {
        if !attr.path().is_ident("component") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("description") || meta.path.is_ident("desc") {
                let value: LitStr = meta.value()?.parse()?;
                result.description = Some(value.value());
                Ok(())
            } else if meta.path.is_ident("validate") {
                let value: LitStr = meta.value()?.parse()?;
                result.validate = Some(value.value());
                Ok(())
            } else if meta.path.is_ident("skip") {
                result.skip = true;
                Ok(())
            } else {
                Err(meta.error("unsupported component attribute"))
            }
        })?;
    }

    Ok(result)
}

#[derive(Default)]
struct SerdeAttrs {
    rename: Option<String>,
    skip: bool,
}

/// Pick out the serde attributes that change the JSON shape of a field.
fn parse_serde_attrs(attrs: &[Attribute]) -> syn::Result<SerdeAttrs> {
    let mut result = SerdeAttrs::default();

    for attr in attrs {
        if !attr.path().is_ident("serde") {
            continue;
        }

        let metas = attr.parse_args_with(Punctuated::<Meta, Token![,]>::parse_terminated)?;
        for meta in metas {
            match meta {
                Meta::Path(path) if path.is_ident("skip") || path.is_ident("skip_deserializing") => {
                    result.skip = true;
                }
                Meta::NameValue(nv) if nv.path.is_ident("rename") => {
                    if let Expr::Lit(lit) = &nv.value {
                        if let Lit::Str(s) = &lit.lit {
                            result.rename = Some(s.value());
                        }
                    }
                }
                _ => {}
            }
        }
    }

    Ok(result)
}

fn split_rules(tag: &str) -> Vec<String> {
    tag.split(',')
        .map(str::trim)
        .filter(|rule| !rule.is_empty() && *rule != "omitempty")
        .map(str::to_string)
        .collect()
}

/// JSON type name shown to form builders.
fn json_type(ty: &Type) -> &'static str {
    let Type::Path(path) = ty else {
        return match ty {
            Type::Reference(r) => json_type(&r.elem),
            Type::Array(_) | Type::Slice(_) => "array",
            _ => "object",
        };
    };

    let Some(segment) = path.path.segments.last() else {
        return "object";
    };

    match segment.ident.to_string().as_str() {
        "Option" | "Box" => match first_generic(&segment.arguments) {
            Some(inner) => json_type(inner),
            None => "object",
        },
        "String" | "str" | "char" => "string",
        "bool" => "boolean",
        "i8" | "i16" | "i32" | "i64" | "i128" | "isize" | "u8" | "u16" | "u32" | "u64"
        | "u128" | "usize" => "integer",
        "f32" | "f64" => "number",
        "Vec" | "VecDeque" | "HashSet" | "BTreeSet" => "array",
        "Value" => "any",
        _ => "object",
    }
}

fn first_generic(arguments: &PathArguments) -> Option<&Type> {
    let PathArguments::AngleBracketed(args) = arguments else {
        return None;
    };
    args.args.iter().find_map(|arg| match arg {
        GenericArgument::Type(ty) => Some(ty),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_rules_drops_omitempty() {
        assert_eq!(
            split_rules("omitempty, oneof=GET POST ,min=1"),
            vec!["oneof=GET POST".to_string(), "min=1".to_string()]
        );
        assert!(split_rules("").is_empty());
    }

    #[test]
    fn test_json_type_mapping() {
        let cases: Vec<(Type, &str)> = vec![
            (syn::parse_quote!(String), "string"),
            (syn::parse_quote!(i64), "integer"),
            (syn::parse_quote!(Option<f64>), "number"),
            (syn::parse_quote!(Vec<i64>), "array"),
            (syn::parse_quote!(std::collections::HashMap<String, String>), "object"),
            (syn::parse_quote!(serde_json::Value), "any"),
            (syn::parse_quote!(bool), "boolean"),
        ];

        for (ty, expected) in cases {
            assert_eq!(json_type(&ty), expected);
        }
    }

    #[test]
    fn test_expand_uses_serde_rename() {
        let input: DeriveInput = syn::parse_quote! {
            #[component(description = "Demo")]
            struct Demo {
                #[serde(rename = "type", default)]
                #[component(validate = "required")]
                kind: String,
                #[serde(skip)]
                cache: Vec<u8>,
            }
        };

        let tokens = expand_component_impl(input).unwrap().to_string();
        assert!(tokens.contains("\"type\""));
        assert!(!tokens.contains("cache"));
        assert!(tokens.contains("\"Demo\""));
    }
}
