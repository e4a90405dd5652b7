/// Creates a [`ScriptDescriptor`](crate::script::ScriptDescriptor).
///
/// # Syntax
///
/// ```rust,ignore
/// use lyre::prelude::*;
///
/// fn manifest() -> Manifest {
///     Manifest::new("Greeter", "1.0.0").description("Says hello")
/// }
///
/// async fn main(ctx: ScriptContext) -> Result<(), BoxError> {
///     ctx.events().on("chat", |event: Arc<Event>| async move { /* ... */ });
///     Ok(())
/// }
///
/// pub static GREETER: ScriptDescriptor = define_script! {
///     name: "greeter",
///     manifest: manifest,
///     main: main,
/// };
/// ```
///
/// `main` may return any `Result<(), E>` where `E: Into<BoxError>`.
#[macro_export]
macro_rules! define_script {
    (
        name: $name:literal,
        manifest: $manifest:path,
        main: $main:path $(,)?
    ) => {{
        fn __lyre_script_main(
            ctx: $crate::context::ScriptContext,
        ) -> $crate::__private::BoxFuture<
            'static,
            ::std::result::Result<(), $crate::error::BoxError>,
        > {
            ::std::boxed::Box::pin(async move {
                $main(ctx)
                    .await
                    .map_err(|e| -> $crate::error::BoxError { e.into() })
            })
        }

        $crate::script::ScriptDescriptor {
            api_version: $crate::script::LYRE_SCRIPT_API_VERSION,
            name: $name,
            manifest: $manifest,
            main: __lyre_script_main,
        }
    }};
}

/// Adds a descriptor to the global [`SCRIPT_REGISTRY`](crate::script::SCRIPT_REGISTRY).
///
/// ```rust,ignore
/// pub static GREETER: ScriptDescriptor = define_script! { /* ... */ };
/// register_script!(GREETER);
/// ```
#[macro_export]
macro_rules! register_script {
    ($descriptor:path) => {
        const _: () = {
            #[$crate::__private::linkme::distributed_slice($crate::script::SCRIPT_REGISTRY)]
            #[linkme(crate = $crate::__private::linkme)]
            static __LYRE_REGISTERED_SCRIPT: &$crate::script::ScriptDescriptor = &$descriptor;
        };
    };
}
