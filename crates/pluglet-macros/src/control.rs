//! `#[derive(ControlSchema)]` implementation.

use proc_macro2::{Span, TokenStream};
use quote::quote;
use syn::{Data, DeriveInput, Field, Fields, Ident, Lit, LitStr, Token, spanned::Spanned};

const KINDS: [(&str, &str); 6] = [
    ("label", "Label"),
    ("text", "Text"),
    ("number", "Number"),
    ("checkbox", "Checkbox"),
    ("password", "Password"),
    ("select", "Select"),
];

/// Parsed `#[control(...)]` of one field.
struct ControlAttrs {
    name: String,
    kind: Ident,
    label: Option<LitStr>,
    comment: Option<LitStr>,
    default: Option<LitStr>,
    required: bool,
    min: Option<f64>,
    max: Option<f64>,
    pattern: Option<LitStr>,
    values: Vec<LitStr>,
}

pub fn derive_control_schema(input: &DeriveInput) -> syn::Result<TokenStream> {
    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            _ => {
                return Err(syn::Error::new(
                    input.span(),
                    "ControlSchema requires a struct with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new(
                input.span(),
                "ControlSchema can only be derived for structs",
            ));
        }
    };

    let mut controls = Vec::new();
    for field in fields {
        if let Some(attrs) = parse_field(field)? {
            if controls.iter().any(|c: &ControlAttrs| c.name == attrs.name) {
                return Err(syn::Error::new(
                    field.span(),
                    format!("duplicate control name `{}`", attrs.name),
                ));
            }
            controls.push(attrs);
        }
    }

    let entries = controls.iter().map(generate_field);
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::pluglet_core::ControlSchema for #name #ty_generics #where_clause {
            fn control_fields() -> ::std::vec::Vec<::pluglet_core::ControlField> {
                ::std::vec![#(#entries),*]
            }
        }
    })
}

fn parse_field(field: &Field) -> syn::Result<Option<ControlAttrs>> {
    let Some(attr) = field.attrs.iter().find(|a| a.path().is_ident("control")) else {
        return Ok(None);
    };
    let Some(ident) = &field.ident else {
        return Ok(None);
    };

    let mut name = ident.to_string().trim_start_matches("r#").to_owned();
    let mut kind = Ident::new("Text", Span::call_site());
    let mut label = None;
    let mut comment = None;
    let mut default = None;
    let mut required = false;
    let mut min = None;
    let mut max = None;
    let mut pattern = None;
    let mut values = Vec::new();

    attr.parse_nested_meta(|meta| {
        if meta.path.is_ident("kind") {
            let lit: LitStr = meta.value()?.parse()?;
            let variant = KINDS
                .iter()
                .find(|(key, _)| *key == lit.value())
                .map(|(_, variant)| *variant)
                .ok_or_else(|| {
                    syn::Error::new(
                        lit.span(),
                        "unknown control kind, expected one of: label, text, number, checkbox, password, select",
                    )
                })?;
            kind = Ident::new(variant, lit.span());
        } else if meta.path.is_ident("name") {
            name = meta.value()?.parse::<LitStr>()?.value();
        } else if meta.path.is_ident("label") {
            label = Some(meta.value()?.parse()?);
        } else if meta.path.is_ident("comment") {
            comment = Some(meta.value()?.parse()?);
        } else if meta.path.is_ident("default") {
            default = Some(meta.value()?.parse()?);
        } else if meta.path.is_ident("required") {
            required = true;
        } else if meta.path.is_ident("min") {
            min = Some(parse_number(meta.value()?)?);
        } else if meta.path.is_ident("max") {
            max = Some(parse_number(meta.value()?)?);
        } else if meta.path.is_ident("pattern") {
            pattern = Some(meta.value()?.parse()?);
        } else if meta.path.is_ident("values") {
            let content;
            syn::parenthesized!(content in meta.input);
            values = content
                .parse_terminated(|input| input.parse::<LitStr>(), Token![,])?
                .into_iter()
                .collect();
        } else {
            return Err(meta.error("unsupported control attribute"));
        }
        Ok(())
    })?;

    Ok(Some(ControlAttrs {
        name,
        kind,
        label,
        comment,
        default,
        required,
        min,
        max,
        pattern,
        values,
    }))
}

fn parse_number(input: syn::parse::ParseStream<'_>) -> syn::Result<f64> {
    let negative = input.parse::<Option<Token![-]>>()?.is_some();
    let value = match input.parse::<Lit>()? {
        Lit::Int(lit) => lit.base10_parse::<f64>()?,
        Lit::Float(lit) => lit.base10_parse::<f64>()?,
        other => return Err(syn::Error::new(other.span(), "expected a number")),
    };
    Ok(if negative { -value } else { value })
}

fn generate_field(attrs: &ControlAttrs) -> TokenStream {
    let name = &attrs.name;
    let kind = &attrs.kind;

    let label = attrs.label.as_ref().map(|l| quote!(.label(#l)));
    let comment = attrs.comment.as_ref().map(|c| quote!(.comment(#c)));
    let default = attrs.default.as_ref().map(|d| quote!(.default_value(#d)));
    let required = attrs.required.then(|| quote!(.required()));
    let min = attrs.min.map(|m| quote!(.min(#m)));
    let max = attrs.max.map(|m| quote!(.max(#m)));
    let pattern = attrs.pattern.as_ref().map(|p| quote!(.pattern(#p)));
    let values = (!attrs.values.is_empty()).then(|| {
        let values = &attrs.values;
        quote!(.values(&[#(#values),*]))
    });

    quote! {
        ::pluglet_core::ControlField::new(#name, ::pluglet_core::ControlKind::#kind)
            #label #comment #default #required #min #max #pattern #values
    }
}
