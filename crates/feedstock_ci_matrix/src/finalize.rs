//! Adjustments of a config that depend on the build platform.

use feedstock_ci_types::NormalizedKey;

use crate::{
    config::{ConfigBody, ConfigValue},
    context::MatrixContext,
};

const DOCKER_IMAGE_KEY: &str = "docker_image";

/// Fill in parameters every job of the build platform needs.
///
/// Linux jobs run in a single container, so `docker_image` is reduced to its
/// first value (or set to the fallback image), and every variable zipped with
/// it is reduced to the value belonging to that image.
pub fn finalize_config(body: &mut ConfigBody, context: &MatrixContext) {
    if !context.build_platform.is_linux() {
        return;
    }

    let docker_image = NormalizedKey::from(DOCKER_IMAGE_KEY);
    match body.variables.get_mut(&docker_image) {
        Some(value) => value.truncate_to_first(),
        None => {
            body.variables.insert(
                docker_image.clone(),
                ConfigValue::List(vec![context.fallback_docker_image.as_str().into()]),
            );
        }
    }

    let Some(zip_keys) = &body.zip_keys else {
        return;
    };
    for group in zip_keys.iter().filter(|group| group.contains(&docker_image)) {
        for key in group.iter().filter(|key| **key != docker_image) {
            if let Some(value) = body.variables.get_mut(key) {
                value.truncate_to_first();
            }
        }
    }
}
