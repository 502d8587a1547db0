//! Mapping between browse scopes and DNS-SD query names.

use sdbrowse_core::error::DiscoveryError;

/// The multicast DNS domain.
pub const LOCAL_DOMAIN: &str = "local";

/// Browse-domain enumeration label (RFC 6763 section 11).
pub const BROWSE_DOMAINS_PREFIX: &str = "b._dns-sd._udp";

/// Service-type enumeration label (RFC 6763 section 9).
pub const META_QUERY_PREFIX: &str = "_services._dns-sd._udp";

/// Maps a scope domain to the domain its queries are sent for.
///
/// The empty scope ("every browsable domain") is served from `local`.
/// `local` goes out over multicast DNS and every other domain over unicast
/// DNS. Sub-domains of `local` have no server to answer them.
pub fn browse_domain(domain: &str) -> Result<String, DiscoveryError> {
    let domain = domain.trim_end_matches('.');
    if domain.is_empty() || domain.eq_ignore_ascii_case(LOCAL_DOMAIN) {
        return Ok(LOCAL_DOMAIN.to_string());
    }

    let lower = domain.to_ascii_lowercase();
    if lower.ends_with(".local") {
        return Err(DiscoveryError::UnsupportedScope {
            domain: domain.to_string(),
            reason: "sub-domains of local are not served by multicast or unicast DNS".to_string(),
        });
    }

    Ok(lower)
}

/// True for names answered by multicast DNS.
pub fn is_multicast_query(query: &str) -> bool {
    let query = query.trim_end_matches('.').to_ascii_lowercase();
    query == LOCAL_DOMAIN || query.ends_with(".local")
}

/// `b._dns-sd._udp.local.`
pub fn domain_query(domain: &str) -> Result<String, DiscoveryError> {
    Ok(format!("{}.{}.", BROWSE_DOMAINS_PREFIX, browse_domain(domain)?))
}

/// `_services._dns-sd._udp.local.`
pub fn service_type_query(domain: &str) -> Result<String, DiscoveryError> {
    Ok(format!("{}.{}.", META_QUERY_PREFIX, browse_domain(domain)?))
}

/// `_http._tcp.local.`
pub fn service_query(service_type: &str, domain: &str) -> Result<String, DiscoveryError> {
    Ok(format!(
        "{}.{}.",
        service_type.trim_end_matches('.'),
        browse_domain(domain)?
    ))
}

/// Domain named by a browse-domain PTR target (`example.com.` -> `example.com`).
pub fn parse_domain(target: &str) -> Option<String> {
    let domain = target.trim_end_matches('.');
    (!domain.is_empty()).then(|| domain.to_string())
}

/// Service type and domain named by a meta-query PTR target
/// (`_http._tcp.local.` -> (`_http._tcp`, `local`)).
pub fn parse_service_type(target: &str) -> Option<(String, String)> {
    let mut labels = target.trim_end_matches('.').splitn(3, '.');
    let service = labels.next()?;
    let transport = labels.next()?;
    let domain = labels.next()?;

    if !service.starts_with('_') || !transport.starts_with('_') || domain.is_empty() {
        return None;
    }

    Some((format!("{}.{}", service, transport), domain.to_string()))
}

/// Instance name of a full service name (`My Printer._ipp._tcp.local.` with
/// query `_ipp._tcp.local.` -> `My Printer`). Instance names may contain dots.
pub fn parse_instance(fullname: &str, query: &str) -> Option<String> {
    let fullname = fullname.trim_end_matches('.');
    let query = query.trim_end_matches('.');

    let split = fullname.len().checked_sub(query.len() + 1)?;
    if !fullname.is_char_boundary(split) {
        return None;
    }

    let (name, suffix) = fullname.split_at(split);
    let suffix = suffix.strip_prefix('.')?;
    (suffix.eq_ignore_ascii_case(query) && !name.is_empty()).then(|| name.to_string())
}

/// Key under which a resolved instance is cached.
pub fn instance_key(name: &str, service_type: &str, domain: &str) -> String {
    format!(
        "{}.{}.{}",
        name,
        service_type.trim_end_matches('.'),
        domain.trim_end_matches('.')
    )
    .to_ascii_lowercase()
}

/// Same key, computed from a full service name.
pub fn fullname_key(fullname: &str) -> String {
    fullname.trim_end_matches('.').to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queries_for_local_scopes() {
        assert_eq!(domain_query("").unwrap(), "b._dns-sd._udp.local.");
        assert_eq!(domain_query("local").unwrap(), "b._dns-sd._udp.local.");
        assert_eq!(
            service_type_query("local.").unwrap(),
            "_services._dns-sd._udp.local."
        );
        assert_eq!(service_query("_http._tcp", "local").unwrap(), "_http._tcp.local.");
    }

    #[test]
    fn test_wide_area_scopes_use_unicast() {
        assert_eq!(
            domain_query("Example.COM.").unwrap(),
            "b._dns-sd._udp.example.com."
        );
        assert_eq!(
            service_type_query("lab.example.org").unwrap(),
            "_services._dns-sd._udp.lab.example.org."
        );
        let query = service_query("_http._tcp", "example.com").unwrap();
        assert_eq!(query, "_http._tcp.example.com.");

        assert!(!is_multicast_query(&query));
        assert!(is_multicast_query("_http._tcp.local."));
        assert!(is_multicast_query("b._dns-sd._udp.LOCAL."));
    }

    #[test]
    fn test_local_sub_domains_are_rejected() {
        assert!(matches!(
            domain_query("lab.local"),
            Err(DiscoveryError::UnsupportedScope { .. })
        ));
        assert!(service_query("_http._tcp", "printers.local.").is_err());
    }

    #[test]
    fn test_parse_ptr_targets() {
        assert_eq!(parse_domain("example.com."), Some("example.com".to_string()));
        assert_eq!(parse_domain("."), None);

        assert_eq!(
            parse_service_type("_http._tcp.local."),
            Some(("_http._tcp".to_string(), "local".to_string()))
        );
        assert_eq!(parse_service_type("_http._tcp"), None);
        assert_eq!(parse_service_type("printer.local."), None);
    }

    #[test]
    fn test_parse_instance() {
        assert_eq!(
            parse_instance("My Printer._ipp._tcp.local.", "_ipp._tcp.local."),
            Some("My Printer".to_string())
        );
        assert_eq!(
            parse_instance("v1.2 build.box._http._tcp.local.", "_http._tcp.local."),
            Some("v1.2 build.box".to_string())
        );
        assert_eq!(
            parse_instance("Web._HTTP._tcp.local.", "_http._tcp.local."),
            Some("Web".to_string())
        );
        assert_eq!(parse_instance("_http._tcp.local.", "_http._tcp.local."), None);
        assert_eq!(parse_instance("Web._ssh._tcp.local.", "_http._tcp.local."), None);
    }

    #[test]
    fn test_cache_keys_agree() {
        assert_eq!(
            instance_key("Web", "_http._tcp", "local"),
            fullname_key("WEB._http._tcp.local.")
        );
    }
}
