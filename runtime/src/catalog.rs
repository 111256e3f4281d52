use crate::capability::{Capability, PropKind, PropSpec};
use crate::host::{Factory, UiHost};
use crate::registry::CapabilityRegistry;
use serde_json::json;

pub const CONTENT_HOST: &str = "content";

pub fn default_capabilities() -> Vec<Capability> {
    use PropKind as K;

    let aria = || PropSpec::of(K::String);

    vec![
        Capability::container("container", CONTENT_HOST)
            .prop("maxWidth", PropSpec::any_of([K::Number, K::String]).with_default(1200))
            .prop("variant", PropSpec::of(K::String).with_default("default")),
        Capability::container("flexbox", CONTENT_HOST)
            .prop("direction", PropSpec::of(K::String))
            .prop("gap", PropSpec::any_of([K::Number, K::String]))
            .prop("padding", PropSpec::any_of([K::Number, K::String]))
            .prop("alignItems", PropSpec::of(K::String))
            .prop("justifyContent", PropSpec::of(K::String)),
        Capability::container("grid", CONTENT_HOST)
            .prop("columns", PropSpec::any_of([K::Number, K::String]).with_default(1))
            .prop("gap", PropSpec::any_of([K::Number, K::String]).with_default(16)),
        Capability::container("card", CONTENT_HOST)
            .prop("title", PropSpec::of(K::String).with_default(""))
            .prop("subtitle", PropSpec::of(K::String))
            .event("click"),
        Capability::container("list", CONTENT_HOST)
            .prop("items", PropSpec::of(K::Array))
            .prop("ordered", PropSpec::of(K::Boolean)),
        Capability::leaf("heading")
            .prop("text", PropSpec::of(K::String).required())
            .prop(
                "level",
                PropSpec::of(K::Number)
                    .one_of([json!(1), json!(2), json!(3), json!(4), json!(5), json!(6)])
                    .with_default(2),
            )
            .prop("ariaLabel", aria()),
        Capability::leaf("paragraph")
            .prop("text", PropSpec::of(K::String).required())
            .prop("ariaLabel", aria()),
        Capability::leaf("divider").prop("ariaLabel", aria()),
        Capability::leaf("input")
            .prop("id", PropSpec::of(K::String))
            .prop(
                "type",
                PropSpec::of(K::String).one_of([json!("text"), json!("number")]),
            )
            .prop("label", PropSpec::of(K::String).required())
            .prop("placeholder", PropSpec::of(K::String))
            .prop("value", PropSpec::any_of([K::String, K::Number, K::Null]))
            .prop("disabled", PropSpec::of(K::Boolean))
            .prop("required", PropSpec::of(K::Boolean))
            .prop("pattern", PropSpec::of(K::String))
            .prop("error", PropSpec::of(K::String))
            .event("change")
            .event("blur"),
        Capability::leaf("select")
            .prop("label", PropSpec::of(K::String))
            .prop("options", PropSpec::of(K::Array))
            .prop("value", PropSpec::of(K::Any))
            .prop("multiple", PropSpec::of(K::Boolean))
            .prop("disabled", PropSpec::of(K::Boolean))
            .event("change"),
        Capability::leaf("checkbox")
            .prop("label", PropSpec::of(K::String))
            .prop("checked", PropSpec::of(K::Boolean))
            .prop("disabled", PropSpec::of(K::Boolean))
            .event("change"),
        Capability::leaf("radio")
            .prop("label", PropSpec::of(K::String))
            .prop("name", PropSpec::of(K::String))
            .prop("options", PropSpec::of(K::Array))
            .prop("value", PropSpec::of(K::Any))
            .event("change"),
        Capability::leaf("textarea")
            .prop("label", PropSpec::of(K::String))
            .prop("placeholder", PropSpec::of(K::String))
            .prop("value", PropSpec::of(K::String))
            .prop("rows", PropSpec::of(K::Number))
            .prop("disabled", PropSpec::of(K::Boolean))
            .event("change"),
        Capability::leaf("button")
            .prop("label", PropSpec::of(K::String))
            .prop(
                "variant",
                PropSpec::of(K::String).one_of([
                    json!("primary"),
                    json!("secondary"),
                    json!("danger"),
                    json!("link"),
                ]),
            )
            .prop("disabled", PropSpec::of(K::Boolean))
            .prop("action", PropSpec::any_of([K::String, K::Object]))
            .event("click"),
        Capability::leaf("error")
            .prop("title", PropSpec::of(K::String))
            .prop("message", PropSpec::of(K::String).required())
            .prop("details", PropSpec::of(K::String))
            .prop("dismissible", PropSpec::of(K::Boolean))
            .prop("visible", PropSpec::of(K::Boolean))
            .event("dismiss"),
    ]
}

/// Registers `capabilities`, building each factory with `factory_for`.
/// Returns how many existing entries were replaced.
pub fn register_catalog<H, F>(
    registry: &mut CapabilityRegistry<H>,
    capabilities: impl IntoIterator<Item = Capability>,
    mut factory_for: F,
) -> usize
where
    H: UiHost,
    F: FnMut(&Capability) -> Factory<H>,
{
    capabilities
        .into_iter()
        .map(|capability| {
            let factory = factory_for(&capability);
            registry.register(capability.name.clone(), factory, capability)
        })
        .filter(|replaced| *replaced)
        .count()
}
