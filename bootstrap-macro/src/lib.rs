//! Procedural macros for the lambda-bootstrap runtime.
//!
//! This crate provides the `#[bootstrap_handler]` attribute macro, which turns
//! a plain async function into a `Handler` implementation so it can be wired
//! into the bootstrap loop explicitly.
//!
//! # Example
//!
//! ```ignore
//! use lambda_bootstrap::prelude::*;
//!
//! #[bootstrap_handler(name = "greet")]
//! async fn greet(name: String, metadata: &InvocationMetadata) -> Result<String, HandlerError> {
//!     Ok(format!("Hello, {} ({})", name, metadata.request_id))
//! }
//!
//! let invoker = HandlerInvoker::with_serializer(GreetHandler::new(), JsonSerializer);
//! ```

use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{
    parse_macro_input, punctuated::Punctuated, Expr, ExprLit, FnArg, GenericArgument, ItemFn, Lit,
    Meta, PathArguments, ReturnType, Token, Type,
};

/// Attributes for the `#[bootstrap_handler]` macro.
#[derive(Default, Debug)]
struct HandlerAttrs {
    /// Handler name, used in logs.
    name: Option<String>,
    /// Optional description.
    description: Option<String>,
}

impl HandlerAttrs {
    fn parse_meta_list(metas: Punctuated<Meta, Token![,]>) -> syn::Result<Self> {
        let mut attrs = HandlerAttrs::default();

        for meta in metas {
            let nv = match meta {
                Meta::NameValue(nv) => nv,
                other => return Err(syn::Error::new_spanned(other, "expected name = value")),
            };
            let ident = nv
                .path
                .get_ident()
                .ok_or_else(|| syn::Error::new_spanned(&nv.path, "expected identifier"))?
                .to_string();

            let value = match &nv.value {
                Expr::Lit(ExprLit {
                    lit: Lit::Str(lit_str),
                    ..
                }) => lit_str.value(),
                _ => return Err(syn::Error::new_spanned(&nv.value, "expected string literal")),
            };

            match ident.as_str() {
                "name" => attrs.name = Some(value),
                "description" => attrs.description = Some(value),
                _ => {
                    return Err(syn::Error::new_spanned(
                        nv.path,
                        format!("unknown attribute: {}", ident),
                    ));
                }
            }
        }

        Ok(attrs)
    }
}

/// Turn an async function into a `Handler`.
///
/// The function must be `async`, take the decoded input by value and the
/// invocation metadata by reference, and return `Result<T, HandlerError>`.
/// A unit struct named `<PascalCaseName>Handler` is generated next to it.
///
/// # Attributes
///
/// - `name` (optional): handler name (default: the function name)
/// - `description` (optional): free-form description
///
/// # Example
///
/// ```ignore
/// #[bootstrap_handler(name = "uppercase")]
/// async fn uppercase(input: String, _metadata: &InvocationMetadata) -> Result<String, HandlerError> {
///     Ok(input.to_uppercase())
/// }
/// ```
#[proc_macro_attribute]
pub fn bootstrap_handler(args: TokenStream, input: TokenStream) -> TokenStream {
    let args = parse_macro_input!(args with Punctuated::<Meta, Token![,]>::parse_terminated);
    let input_fn = parse_macro_input!(input as ItemFn);

    match generate_handler(args, input_fn) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn generate_handler(
    args: Punctuated<Meta, Token![,]>,
    input_fn: ItemFn,
) -> syn::Result<proc_macro2::TokenStream> {
    let attrs = HandlerAttrs::parse_meta_list(args)?;

    let fn_name = &input_fn.sig.ident;
    let fn_vis = &input_fn.vis;
    let handler_name = attrs.name.unwrap_or_else(|| fn_name.to_string());
    let description = attrs.description.unwrap_or_default();
    let struct_name = format_ident!("{}Handler", to_pascal_case(&fn_name.to_string()));

    if input_fn.sig.asyncness.is_none() {
        return Err(syn::Error::new_spanned(
            &input_fn.sig,
            "bootstrap_handler must be async",
        ));
    }
    if input_fn.sig.inputs.len() != 2 {
        return Err(syn::Error::new_spanned(
            &input_fn.sig.inputs,
            "expected (input, &InvocationMetadata)",
        ));
    }

    let input_ty = match input_fn.sig.inputs.first() {
        Some(FnArg::Typed(pat)) => pat.ty.as_ref().clone(),
        _ => {
            return Err(syn::Error::new_spanned(
                &input_fn.sig.inputs,
                "handler cannot take self",
            ))
        }
    };
    let output_ty = result_ok_type(&input_fn.sig.output)?;

    let expanded = quote! {
        /// Generated handler struct.
        #[derive(Debug, Default, Clone, Copy)]
        #fn_vis struct #struct_name;

        #[allow(dead_code)]
        impl #struct_name {
            /// Create a new instance of the handler.
            pub fn new() -> Self {
                Self
            }

            /// Handler name.
            pub fn name(&self) -> &'static str {
                #handler_name
            }

            /// Handler description.
            pub fn description(&self) -> &'static str {
                #description
            }
        }

        #[lambda_bootstrap::prelude::async_trait]
        impl lambda_bootstrap::function::Handler for #struct_name {
            type Input = #input_ty;
            type Output = #output_ty;

            async fn handle(
                &self,
                input: #input_ty,
                metadata: &lambda_bootstrap::invocation::InvocationMetadata,
            ) -> Result<#output_ty, lambda_bootstrap::function::HandlerError> {
                #fn_name(input, metadata).await
            }
        }

        #input_fn
    };

    Ok(expanded)
}

/// Extract `T` from a `Result<T, E>` return type.
fn result_ok_type(output: &ReturnType) -> syn::Result<Type> {
    let ty = match output {
        ReturnType::Type(_, ty) => ty.as_ref(),
        ReturnType::Default => {
            return Err(syn::Error::new_spanned(
                output,
                "handler must return Result<T, HandlerError>",
            ))
        }
    };

    if let Type::Path(path) = ty {
        if let Some(segment) = path.path.segments.last() {
            if segment.ident == "Result" {
                if let PathArguments::AngleBracketed(args) = &segment.arguments {
                    if let Some(GenericArgument::Type(ok)) = args.args.first() {
                        return Ok(ok.clone());
                    }
                }
            }
        }
    }

    Err(syn::Error::new_spanned(
        ty,
        "handler must return Result<T, HandlerError>",
    ))
}

/// Convert a snake_case string to PascalCase.
fn to_pascal_case(s: &str) -> String {
    s.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                None => String::new(),
                Some(first) => first.to_uppercase().chain(chars).collect(),
            }
        })
        .collect()
}
