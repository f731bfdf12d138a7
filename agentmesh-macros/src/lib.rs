//! Procedural macros for mesh tool definitions.
//!
//! The `#[tool]` attribute decorates async functions and generates the
//! registration glue the startup pipeline uses to collect them via
//! [`inventory`] without any import-time side effects.

use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::{format_ident, quote};
use syn::parse::{Parse, ParseStream};
use syn::parse_macro_input;
use syn::spanned::Spanned;
use syn::{
    Error, Expr, ExprArray, ItemFn, Lit, LitStr, MetaNameValue, PathArguments, Result, ReturnType,
    Type, parse_quote,
};

#[derive(Default)]
struct ToolArgs {
    capability: Option<LitStr>,
    version: Option<LitStr>,
    description: Option<LitStr>,
    tags: Vec<LitStr>,
    dependencies: Vec<LitStr>,
}

impl ToolArgs {
    fn parse(args: Vec<MetaNameValue>) -> Result<Self> {
        let mut parsed = ToolArgs::default();
        for arg in args {
            let MetaNameValue { path, value, .. } = arg;
            if path.is_ident("capability") {
                parsed.capability = Some(expect_lit_str(value, "capability")?);
            } else if path.is_ident("version") {
                parsed.version = Some(expect_lit_str(value, "version")?);
            } else if path.is_ident("description") {
                parsed.description = Some(expect_lit_str(value, "description")?);
            } else if path.is_ident("tags") {
                parsed.tags = parse_str_array(value, "tags")?;
            } else if path.is_ident("dependencies") {
                parsed.dependencies = parse_str_array(value, "dependencies")?;
            } else {
                return Err(Error::new(
                    path.span(),
                    "unsupported attribute key; expected one of `capability`, `version`, `description`, `tags`, or `dependencies`",
                ));
            }
        }

        if parsed.capability.is_none() {
            return Err(Error::new(
                Span::call_site(),
                "missing required attribute `capability`",
            ));
        }

        if parsed.version.is_none() {
            return Err(Error::new(
                Span::call_site(),
                "missing required attribute `version`",
            ));
        }

        Ok(parsed)
    }
}

fn expect_lit_str(expr: Expr, field: &str) -> Result<LitStr> {
    match expr {
        Expr::Lit(syn::ExprLit {
            lit: Lit::Str(lit), ..
        }) => Ok(lit),
        other => Err(Error::new(
            other.span(),
            format!("`{field}` must be a string literal"),
        )),
    }
}

fn parse_str_array(expr: Expr, field: &str) -> Result<Vec<LitStr>> {
    match expr {
        Expr::Array(ExprArray { elems, .. }) => {
            let mut values = Vec::with_capacity(elems.len());
            for elem in elems {
                values.push(expect_lit_str(elem, &format!("{field} entry"))?);
            }
            Ok(values)
        }
        other => Err(Error::new(
            other.span(),
            format!("`{field}` must be an array of string literals"),
        )),
    }
}

fn extract_success_type(output: &ReturnType) -> Result<Type> {
    match output {
        ReturnType::Type(_, ty) => match ty.as_ref() {
            Type::Path(path) => {
                let last = path.path.segments.last().ok_or_else(|| {
                    Error::new(path.span(), "unsupported return type for tool function")
                })?;
                if last.ident != "ToolResult" {
                    return Err(Error::new(
                        last.ident.span(),
                        "tool functions must return agentmesh_tools::registry::ToolResult<T>",
                    ));
                }
                match &last.arguments {
                    PathArguments::AngleBracketed(args) => {
                        if args.args.len() != 1 {
                            return Err(Error::new(
                                args.span(),
                                "ToolResult must contain exactly one generic argument",
                            ));
                        }
                        match &args.args[0] {
                            syn::GenericArgument::Type(ty) => Ok((*ty).clone()),
                            other => Err(Error::new(
                                other.span(),
                                "ToolResult generic argument must be a concrete type",
                            )),
                        }
                    }
                    PathArguments::None => Err(Error::new(
                        last.arguments.span(),
                        "ToolResult must specify a success type",
                    )),
                    other @ PathArguments::Parenthesized(_) => Err(Error::new(
                        other.span(),
                        "unsupported ToolResult generic arguments",
                    )),
                }
            }
            other => Err(Error::new(
                other.span(),
                "unsupported return type for tool function",
            )),
        },
        ReturnType::Default => Err(Error::new(
            Span::call_site(),
            "tool functions must return agentmesh_tools::registry::ToolResult<T>",
        )),
    }
}

struct ToolAttrInput {
    entries: Vec<MetaNameValue>,
}

impl Parse for ToolAttrInput {
    fn parse(input: ParseStream<'_>) -> Result<Self> {
        let mut entries = Vec::new();
        while !input.is_empty() {
            entries.push(input.parse()?);
            if input.peek(syn::Token![,]) {
                let _ = input.parse::<syn::Token![,]>()?;
            }
        }
        Ok(Self { entries })
    }
}

/// Marks an async function as a mesh tool, generating a `{fn}_binding()`
/// constructor, a `register_{fn}(store)` helper, and an `inventory::submit!`
/// entry so the decorator store can collect it at startup without the
/// function ever having to run at load time.
#[proc_macro_attribute]
#[allow(clippy::too_many_lines, clippy::missing_panics_doc)]
pub fn tool(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args_tokens = parse_macro_input!(attr as ToolAttrInput);
    let args = match ToolArgs::parse(args_tokens.entries) {
        Ok(args) => args,
        Err(err) => return err.to_compile_error().into(),
    };

    let mut function = parse_macro_input!(item as ItemFn);

    if function.sig.asyncness.is_none() {
        return Error::new(function.sig.ident.span(), "tool functions must be async")
            .to_compile_error()
            .into();
    }

    let mut arguments = Vec::new();
    for arg in &function.sig.inputs {
        match arg {
            syn::FnArg::Typed(pat_type) => {
                let ident = match pat_type.pat.as_ref() {
                    syn::Pat::Ident(pat_ident) => pat_ident.ident.clone(),
                    other => {
                        return Error::new(
                            other.span(),
                            "tool parameters must be simple identifiers",
                        )
                        .to_compile_error()
                        .into();
                    }
                };
                arguments.push((ident, (*pat_type.ty).clone()));
            }
            syn::FnArg::Receiver(_) => {
                return Error::new(
                    function.sig.inputs.span(),
                    "tool functions cannot take `self` receivers",
                )
                .to_compile_error()
                .into();
            }
        }
    }
    if arguments.is_empty() {
        return Error::new(
            function.sig.span(),
            "tool functions must accept at least one argument",
        )
        .to_compile_error()
        .into();
    }

    let original_output = function.sig.output.clone();
    let success_ty = match extract_success_type(&original_output) {
        Ok(ty) => ty,
        Err(err) => return err.to_compile_error().into(),
    };

    function.sig.asyncness = None;
    function.sig.output = parse_quote!(-> ::agentmesh_tools::registry::ToolFuture);
    let original_body = function.block;
    function.block = Box::new(parse_quote!({
        ::std::boxed::Box::pin(async move #original_body)
    }));

    let fn_ident = &function.sig.ident;
    let binding_ident = format_ident!("{}_binding", fn_ident);
    let register_ident = format_ident!("register_{}", fn_ident);

    let vis = &function.vis;

    let capability_lit = args.capability.expect("capability checked above");
    let version_lit = args.version.expect("version checked above");
    let function_name_lit = LitStr::new(&fn_ident.to_string(), fn_ident.span());

    let description_stmt = args.description.map(|desc| {
        quote! {
            metadata = metadata.with_description(#desc);
        }
    });

    let tags_stmt = if args.tags.is_empty() {
        quote! {}
    } else {
        let tags = &args.tags;
        quote! {
            metadata = metadata.with_tags(vec![#(#tags.to_string()),*]);
        }
    };

    let dependencies_stmt = if args.dependencies.is_empty() {
        quote! {}
    } else {
        let deps = &args.dependencies;
        quote! {
            metadata = metadata.with_dependencies(vec![
                #(
                    ::serde_json::from_value(::serde_json::Value::String(#deps.to_string()))
                        .map_err(|err| ::agentmesh_tools::registry::ToolError::InvalidMetadata {
                            reason: format!("invalid dependency `{}`: {err}", #deps),
                        })?
                ),*
            ]);
        }
    };

    let decode_arguments = if arguments.len() == 1 {
        let (ident, ty) = &arguments[0];
        quote! {
            let #ident: #ty = ::serde_json::from_value(input).map_err(|err| {
                ::agentmesh_tools::registry::ToolError::execution(format!(
                    "failed to decode `{}` payload: {err}",
                    #function_name_lit,
                ))
            })?;
        }
    } else {
        let field_decoders = arguments.iter().map(|(ident, ty)| {
            let field_name = ident.to_string();
            quote! {
                let value = map.remove(#field_name).ok_or_else(|| {
                    ::agentmesh_tools::registry::ToolError::execution(format!(
                        "tool `{}` missing field `{}`",
                        #function_name_lit,
                        #field_name,
                    ))
                })?;
                let #ident: #ty = ::serde_json::from_value(value).map_err(|err| {
                    ::agentmesh_tools::registry::ToolError::execution(format!(
                        "failed to decode `{}` field `{}`: {err}",
                        #function_name_lit,
                        #field_name,
                    ))
                })?;
            }
        });
        quote! {
            let mut map = match input {
                ::serde_json::Value::Object(map) => map,
                _ => {
                    return Err(::agentmesh_tools::registry::ToolError::execution(format!(
                        "tool `{}` expects an object payload",
                        #function_name_lit,
                    )));
                }
            };
            #(#field_decoders)*
        }
    };
    let arg_idents: Vec<_> = arguments.iter().map(|(ident, _)| ident).collect();

    let expanded = quote! {
        #function

        #vis fn #binding_ident() -> ::agentmesh_tools::registry::ToolResult<::agentmesh_tools::registry::ToolBinding> {
            let mut metadata = ::agentmesh_tools::registry::ToolMetadata::new(
                #function_name_lit,
                #capability_lit,
                #version_lit,
            )?;
            #description_stmt
            #tags_stmt
            #dependencies_stmt

            Ok(::agentmesh_tools::registry::ToolBinding::new(
                metadata,
                |input: ::serde_json::Value| -> ::agentmesh_tools::registry::ToolFuture {
                    ::std::boxed::Box::pin(async move {
                        #decode_arguments
                        let result: #success_ty = #fn_ident(#(#arg_idents),*).await?;
                        ::serde_json::to_value(result).map_err(|err| {
                            ::agentmesh_tools::registry::ToolError::execution(format!(
                                "failed to encode `{}` response: {err}",
                                #function_name_lit,
                            ))
                        })
                    })
                },
            ))
        }

        #vis fn #register_ident(
            store: &::agentmesh_tools::registry::DecoratorStore,
        ) -> ::agentmesh_tools::registry::ToolResult<()> {
            store.register_binding(#binding_ident()?)
        }

        ::agentmesh_tools::inventory::submit! {
            ::agentmesh_tools::registry::InventoryTool(#binding_ident)
        }
    };

    TokenStream::from(expanded)
}
