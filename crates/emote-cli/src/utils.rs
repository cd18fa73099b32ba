use emote_core::{FilterMode, Settings};

/// Print `:trigger:  replacement` lines with aligned replacements.
pub fn print_aliases<'a, I>(aliases: I)
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let aliases: Vec<_> = aliases.into_iter().collect();
    if aliases.is_empty() {
        println!("No aliases defined.");
        return;
    }

    let width = aliases
        .iter()
        .map(|(trigger, _)| trigger.chars().count() + 2)
        .max()
        .unwrap_or(0);

    for (trigger, replacement) in aliases {
        let code = format!(":{}:", trigger);
        println!("{:<width$}  {}", code, replacement, width = width);
    }
}

pub fn print_filter(settings: &Settings) {
    println!("Filter mode: {}", settings.filter_mode);

    match settings.filter_mode {
        FilterMode::Off => println!("emote is active in every application."),
        FilterMode::Allow => println!("emote is active only in the applications below."),
        FilterMode::Deny => println!("emote is active everywhere except the applications below."),
    }

    if settings.bundle_identifiers.is_empty() {
        println!("  (no applications listed)");
    } else {
        for id in &settings.bundle_identifiers {
            println!("  {}", id);
        }
    }
}

pub fn print_settings(settings: &Settings) {
    match serde_json::to_string_pretty(settings) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to render settings: {}", e),
    }
}
