use proc_macro::TokenStream;
use proc_macro2::{Ident, Span, TokenStream as TokenStream2};
use proc_macro_crate::{FoundCrate, crate_name};
use quote::{format_ident, quote};
use syn::{Data, DeriveInput, Fields, parse_macro_input};

#[proc_macro_derive(FormModel)]
pub fn derive_form_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    if !input.generics.params.is_empty() {
        return syn::Error::new_spanned(
            input.ident,
            "FormModel derive currently supports only non-generic structs",
        )
        .to_compile_error()
        .into();
    }

    let model_ident = input.ident;
    let fields_struct_ident = format_ident!("{model_ident}Fields");

    let named_fields = match input.data {
        Data::Struct(data) => match data.fields {
            Fields::Named(fields) => fields.named,
            _ => {
                return syn::Error::new(
                    Span::call_site(),
                    "FormModel derive requires a struct with named fields",
                )
                .to_compile_error()
                .into();
            }
        },
        _ => {
            return syn::Error::new(
                Span::call_site(),
                "FormModel derive is only supported on structs",
            )
            .to_compile_error()
            .into();
        }
    };

    let calmform = calmform_path();
    let mut key_methods = Vec::new();
    let mut key_consts = Vec::new();
    let mut to_values = Vec::new();
    let mut from_values = Vec::new();

    for field in named_fields {
        let Some(field_ident) = field.ident else {
            continue;
        };
        let field_ty = field.ty;
        let field_name = field_ident.to_string();

        key_methods.push(quote! {
            pub const fn #field_ident(&self) -> #calmform::FieldKey {
                #calmform::FieldKey::new(#field_name)
            }
        });

        key_consts.push(quote! {
            #calmform::FieldKey::new(#field_name)
        });

        to_values.push(quote! {
            values.insert(
                #calmform::FieldKey::new(#field_name),
                #calmform::FieldValue::from(::core::clone::Clone::clone(&self.#field_ident)),
            );
        });

        from_values.push(quote! {
            #field_ident: <#field_ty as #calmform::FromFieldValue>::from_field_value(
                values.get(#field_name).unwrap_or(&#calmform::FieldValue::Empty),
            )
            .ok_or(#calmform::FormError::FieldType {
                key: #calmform::FieldKey::new(#field_name),
                expected: ::core::any::type_name::<#field_ty>(),
            })?,
        });
    }

    quote! {
        #[derive(Clone, Copy, Debug, Default)]
        pub struct #fields_struct_ident;

        impl #fields_struct_ident {
            #(#key_methods)*
        }

        impl #calmform::FormModel for #model_ident {
            type Fields = #fields_struct_ident;

            fn fields() -> Self::Fields {
                #fields_struct_ident
            }

            fn field_keys() -> &'static [#calmform::FieldKey] {
                const KEYS: &[#calmform::FieldKey] = &[#(#key_consts),*];
                KEYS
            }

            fn to_values(&self) -> #calmform::FormValues {
                let mut values = #calmform::FormValues::new();
                #(#to_values)*
                values
            }

            fn from_values(
                values: &#calmform::FormValues,
            ) -> #calmform::FormResult<Self> {
                Ok(Self {
                    #(#from_values)*
                })
            }
        }
    }
    .into()
}

fn calmform_path() -> TokenStream2 {
    match crate_name("calmform") {
        Ok(FoundCrate::Name(name)) => {
            let ident = Ident::new(&name, Span::call_site());
            quote!(::#ident)
        }
        Ok(FoundCrate::Itself) => quote!(crate),
        Err(_) => quote!(::calmform),
    }
}
