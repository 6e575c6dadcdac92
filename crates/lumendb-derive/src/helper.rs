use proc_macro2::TokenStream;
use quote::{ToTokens, quote};

// Quoting helpers

/// Quote a slice by transforming each element and returning a token array.
pub fn quote_slice<T, F>(items: &[T], transform: F) -> TokenStream
where
    F: Fn(&T) -> TokenStream,
{
    let items: Vec<TokenStream> = items
        .iter()
        .map(transform)
        .filter(|ts| !ts.is_empty())
        .collect();

    quote! {
        &[#(#items),*]
    }
}

/// `.setter(value)` when the value is present.
pub fn quote_setter<T: ToTokens>(setter: &str, value: Option<&T>) -> TokenStream {
    let setter = quote::format_ident!("{setter}");

    value.map_or_else(TokenStream::new, |value| quote!(.#setter(#value)))
}

/// `.setter()` when the flag is set.
pub fn quote_flag(setter: &str, enabled: bool) -> TokenStream {
    let setter = quote::format_ident!("{setter}");

    if enabled {
        quote!(.#setter())
    } else {
        TokenStream::new()
    }
}

/// Schema name of a field not renamed explicitly.
pub fn schema_name(field: &syn::Ident, name: Option<&String>) -> String {
    name.cloned().unwrap_or_else(|| {
        lumendb_utils::NamingConvention::CamelCase.convert(&field.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proc_macro2::Span;

    #[test]
    fn schema_name_defaults_to_camel_case() {
        let field = syn::Ident::new("referenced_files", Span::call_site());

        assert_eq!(schema_name(&field, None), "referencedFiles");
        assert_eq!(schema_name(&field, Some(&"files".to_string())), "files");
    }

    #[test]
    fn absent_setters_emit_nothing() {
        assert!(quote_setter::<String>("description", None).is_empty());
        assert!(quote_flag("unique", false).is_empty());
        assert!(quote_flag("unique", true).to_string().contains("unique"));
    }
}
