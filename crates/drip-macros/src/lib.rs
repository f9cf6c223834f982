use proc_macro::TokenStream;

mod component;

/// Derives `drip_core::component::Component` for a handler configuration struct.
///
/// Each named field becomes a schema entry. The JSON name follows
/// `#[serde(rename = "...")]`, and fields marked `#[serde(skip)]` or
/// `#[component(skip)]` are left out.
///
/// # Attributes
/// - `#[component(description = "...")]` on the struct describes the component
/// - `#[component(validate = "required,min=1")]` on a field lists its rules
/// - `#[component(description = "...")]` on a field describes it
///
/// # Example
/// ```ignore
/// #[derive(Default, Serialize, Deserialize, Component)]
/// #[component(description = "Sends an email using a stored template")]
/// pub struct SendEmail {
///     #[component(validate = "required,min=1", description = "Template to render")]
///     pub template_id: i64,
/// }
/// ```
#[proc_macro_derive(Component, attributes(component))]
pub fn derive_component(item: TokenStream) -> TokenStream {
    component::expand_component(item)
}
