use quote::{quote, quote_spanned};
use syn::spanned::Spanned;
use syn::{parse_macro_input, parse_quote, Data, DeriveInput, GenericParam, Generics, Type};

/// Makes a single-field tuple struct usable as a typed path parameter.
///
/// Expands to a `std::str::FromStr` implementation that parses the inner
/// field and wraps it, so `PathParam<ItemId>` works for:
///
/// ```ignore
/// #[derive(FromParam)]
/// struct ItemId(i64);
/// ```
#[proc_macro_derive(FromParam)]
pub fn derive_from_param(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    // Parse the input tokens into a syntax tree
    let input = parse_macro_input!(input as DeriveInput);

    // Used in the quasi-quotation below as `#name`.
    let name = input.ident;

    let ty = match inner_type(&input.data, name.span()) {
        Ok(ty) => ty,
        Err(e) => return e.to_compile_error().into(),
    };

    // Add a bound `T: FromStr` to every type parameter T.
    let generics = add_trait_bounds(input.generics);
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let parse = quote_spanned!(ty.span() =>
        <#ty as ::std::str::FromStr>::from_str(param).map(Self)
    );

    let expanded = quote! {
        impl #impl_generics ::std::str::FromStr for #name #ty_generics #where_clause {
            type Err = <#ty as ::std::str::FromStr>::Err;

            fn from_str(param: &str) -> ::std::result::Result<Self, Self::Err> {
                #parse
            }
        }
    };

    // Hand the output tokens back to the compiler.
    proc_macro::TokenStream::from(expanded)
}

fn add_trait_bounds(mut generics: Generics) -> Generics {
    for param in &mut generics.params {
        if let GenericParam::Type(ref mut type_param) = *param {
            type_param.bounds.push(parse_quote!(::std::str::FromStr));
        }
    }
    generics
}

/// Returns the type of the only field of a tuple struct.
fn inner_type(data: &Data, span: proc_macro2::Span) -> syn::Result<Type> {
    let error = || {
        syn::Error::new(
            span,
            "FromParam can only be derived for tuple structs with exactly one field",
        )
    };

    match *data {
        Data::Struct(ref data) => match data.fields {
            syn::Fields::Unnamed(ref fields) if fields.unnamed.len() == 1 => fields
                .unnamed
                .iter()
                .next()
                .map(|field| field.ty.clone())
                .ok_or_else(error),
            _ => Err(error()),
        },
        Data::Enum(_) | Data::Union(_) => Err(error()),
    }
}
