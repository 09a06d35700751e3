/// Email domains are stored lower-cased so the uniqueness constraint is
/// case-insensitive in practice.
pub fn normalize_domain(domain: &str) -> String {
    domain.trim().to_lowercase()
}

/// Collapses runs of whitespace and trims, like Rails' `squish`.
pub fn squish(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Default organization name derived from a domain: first label, capitalized.
pub fn name_from_domain(domain: &str) -> String {
    let label = domain.split('.').next().unwrap_or(domain);
    let mut chars = label.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_is_lowercased_and_trimmed() {
        assert_eq!(normalize_domain("  Acme.COM "), "acme.com");
    }

    #[test]
    fn squish_collapses_inner_whitespace() {
        assert_eq!(squish("  Acme   Corp \n Ltd "), "Acme Corp Ltd");
    }

    #[test]
    fn name_from_domain_capitalizes_first_label() {
        assert_eq!(name_from_domain("acme.com"), "Acme");
        assert_eq!(name_from_domain("sub.acme.co.uk"), "Sub");
    }
}
