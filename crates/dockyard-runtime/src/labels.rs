//! Traefik-style routing labels: the contract between a deployed container
//! and the reverse proxy that discovers it.

use std::collections::HashMap;

/// Builds the label set a user container is created with so the reverse
/// proxy picks it up as `https://<slug>.<base_domain>`.
pub struct RoutingLabels {
    pub slug: String,
    pub base_domain: String,
    pub listen_port: u16,
    pub tls_enabled: bool,
    pub cert_resolver: Option<String>,
}

impl RoutingLabels {
    /// Render the label set Traefik (or a compatible proxy) watches,
    /// plus platform-owned bookkeeping labels (`managed`, `slug`).
    pub fn build(&self) -> HashMap<String, String> {
        let router = format!("dockyard-{}", self.slug);
        let mut labels = HashMap::new();

        labels.insert("traefik.enable".into(), "true".into());
        labels.insert(
            format!("traefik.http.routers.{router}.rule"),
            format!("Host(`{}.{}`)", self.slug, self.base_domain),
        );
        labels.insert(
            format!("traefik.http.routers.{router}.entrypoints"),
            "web,websecure".into(),
        );
        labels.insert(
            format!("traefik.http.services.{router}.loadbalancer.server.port"),
            self.listen_port.to_string(),
        );

        if self.tls_enabled {
            labels.insert(format!("traefik.http.routers.{router}.tls"), "true".into());
            if let Some(resolver) = &self.cert_resolver {
                labels.insert(
                    format!("traefik.http.routers.{router}.tls.certresolver"),
                    resolver.clone(),
                );
            }
        }

        labels.insert("dockyard.managed".into(), "true".into());
        labels.insert("dockyard.slug".into(), self.slug.clone());

        labels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_host_rule_and_port() {
        let labels = RoutingLabels {
            slug: "my-app".into(),
            base_domain: "apps.example.com".into(),
            listen_port: 3000,
            tls_enabled: false,
            cert_resolver: None,
        }
        .build();

        assert_eq!(labels.get("traefik.enable"), Some(&"true".to_string()));
        assert_eq!(
            labels.get("traefik.http.routers.dockyard-my-app.rule"),
            Some(&"Host(`my-app.apps.example.com`)".to_string())
        );
        assert_eq!(
            labels.get("traefik.http.services.dockyard-my-app.loadbalancer.server.port"),
            Some(&"3000".to_string())
        );
        assert!(!labels.contains_key("traefik.http.routers.dockyard-my-app.tls"));
        assert_eq!(labels.get("dockyard.managed"), Some(&"true".to_string()));
        assert_eq!(labels.get("dockyard.slug"), Some(&"my-app".to_string()));
    }

    #[test]
    fn enables_tls_with_cert_resolver() {
        let labels = RoutingLabels {
            slug: "secure-app".into(),
            base_domain: "apps.example.com".into(),
            listen_port: 8080,
            tls_enabled: true,
            cert_resolver: Some("letsencrypt".into()),
        }
        .build();

        assert_eq!(
            labels.get("traefik.http.routers.dockyard-secure-app.tls"),
            Some(&"true".to_string())
        );
        assert_eq!(
            labels.get("traefik.http.routers.dockyard-secure-app.tls.certresolver"),
            Some(&"letsencrypt".to_string())
        );
    }

    #[test]
    fn omits_cert_resolver_when_absent() {
        let labels = RoutingLabels {
            slug: "bare-tls".into(),
            base_domain: "apps.example.com".into(),
            listen_port: 8080,
            tls_enabled: true,
            cert_resolver: None,
        }
        .build();

        assert_eq!(
            labels.get("traefik.http.routers.dockyard-bare-tls.tls"),
            Some(&"true".to_string())
        );
        assert!(!labels.contains_key("traefik.http.routers.dockyard-bare-tls.tls.certresolver"));
    }
}
