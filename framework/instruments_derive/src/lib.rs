use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, ItemFn, LitStr};

/// Time an async method and report it to `self.reporter` as an operation.
///
/// The operation id is the function name, optionally prefixed with `prefix`. For example
/// `#[dirstress_instrument(prefix = "ldap_")]` on `async fn search` reports `ldap_search`.
///
/// The method must return a `Result`. An `Err` is reported as a failed operation. The body runs
/// inside an async block, so convert errors with `map_err` instead of using `?` in it.
#[proc_macro_attribute]
pub fn dirstress_instrument(args: TokenStream, input: TokenStream) -> TokenStream {
    let mut prefix = String::new();
    let args_parser = syn::meta::parser(|meta| {
        if meta.path.is_ident("prefix") {
            prefix = meta.value()?.parse::<LitStr>()?.value();
            Ok(())
        } else {
            Err(meta.error("unsupported dirstress_instrument property"))
        }
    });
    parse_macro_input!(args with args_parser);

    let mut input = parse_macro_input!(input as ItemFn);

    if input.sig.asyncness.is_none() {
        return syn::Error::new_spanned(&input.sig, "dirstress_instrument requires an async fn")
            .to_compile_error()
            .into();
    }

    let operation_id = format!("{}{}", prefix, input.sig.ident);
    let output_ty = match &input.sig.output {
        syn::ReturnType::Type(_, ty) => quote!(#ty),
        syn::ReturnType::Default => quote!(()),
    };
    let block = &input.block;

    input.block = syn::parse_quote! {{
        let __operation_record = ::dirstress_instruments::OperationRecord::new(#operation_id);
        let __result: #output_ty = async #block.await;
        ::dirstress_instruments::report_operation(
            self.reporter.clone(),
            __operation_record,
            &__result,
        );
        __result
    }};

    TokenStream::from(quote!(#input))
}
