//! Built-in LLaMA prompt templates.

/// Image-to-video captioning template. `{}` marks where the prompt goes.
pub const PROMPT_TEMPLATE_ENCODE_VIDEO_I2V: &str = concat!(
    "<|start_header_id|>system<|end_header_id|>\n\n<image>\nDescribe the video by detailing the following aspects according to the reference image: ",
    "1. The main content and theme of the video.",
    "2. The color, shape, size, texture, quantity, text, and spatial relationships of the objects.",
    "3. Actions, events, behaviors temporal relationships, physical movement changes of the objects.",
    "4. background environment, light, style and atmosphere.",
    "5. camera angles, movements, and transitions used in the video:<|eot_id|>\n\n",
    "<|start_header_id|>user<|end_header_id|>\n\n{}<|eot_id|>",
    "<|start_header_id|>assistant<|end_header_id|>\n\n",
);

/// Template aliases accepted in place of a full template.
pub const TEMPLATE_ALIASES: &[(&str, &str)] = &[("hunyuan_image", PROMPT_TEMPLATE_ENCODE_VIDEO_I2V)];

/// Expand a template alias. Empty input means no template.
pub fn resolve_llama_template(template: Option<&str>) -> Option<String> {
    let template = template.filter(|t| !t.is_empty())?;
    let resolved = TEMPLATE_ALIASES
        .iter()
        .find(|(alias, _)| *alias == template)
        .map_or(template, |(_, full)| *full);
    Some(resolved.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alias_expands() {
        let t = resolve_llama_template(Some("hunyuan_image")).unwrap();
        assert_eq!(t, PROMPT_TEMPLATE_ENCODE_VIDEO_I2V);
        assert!(t.contains("<|start_header_id|>user<|end_header_id|>\n\n{}"));
    }

    #[test]
    fn custom_template_is_kept() {
        assert_eq!(
            resolve_llama_template(Some("<s>{}</s>")).as_deref(),
            Some("<s>{}</s>")
        );
    }

    #[test]
    fn empty_means_none() {
        assert_eq!(resolve_llama_template(Some("")), None);
        assert_eq!(resolve_llama_template(None), None);
    }
}
