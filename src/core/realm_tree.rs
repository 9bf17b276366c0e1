use std::collections::HashMap;

/// Explicit cross-realm paths: client realm, then server realm, then the
/// intermediate realms in order. A `"."` entry stands for a direct path.
pub type Capaths = HashMap<String, HashMap<String, Vec<String>>>;

/// Realms crossed when going from `client` to `server`, both included.
/// Explicit capaths win over the hierarchical layout of the realm names.
pub fn realm_path(capaths: &Capaths, client: &str, server: &str) -> Vec<String> {
    if client == server {
        return vec![client.to_string()];
    }

    if let Some(intermediates) =
        capaths.get(client).and_then(|servers| servers.get(server))
    {
        let mut path = vec![client.to_string()];
        for realm in intermediates {
            if realm != "." && realm != client && realm != server {
                path.push(realm.clone());
            }
        }
        path.push(server.to_string());
        return path;
    }

    return hierarchical_path(client, server);
}

/// Path through the dotted realm hierarchy: up from the client to the
/// closest common ancestor, then down to the server. Realms without a common
/// ancestor are joined through their top level labels.
pub fn hierarchical_path(client: &str, server: &str) -> Vec<String> {
    if client == server {
        return vec![client.to_string()];
    }

    let client_labels: Vec<&str> = client.split('.').collect();
    let server_labels: Vec<&str> = server.split('.').collect();

    let common = client_labels
        .iter()
        .rev()
        .zip(server_labels.iter().rev())
        .take_while(|(c, s)| c == s)
        .count();

    let mut path = Vec::new();
    for i in 0..(client_labels.len() - common) {
        path.push(client_labels[i..].join("."));
    }

    if common > 0 {
        path.push(client_labels[client_labels.len() - common..].join("."));
    }

    for i in (0..(server_labels.len() - common)).rev() {
        path.push(server_labels[i..].join("."));
    }

    return path;
}

/// Intermediate realms between `client` and `server`, both excluded.
pub fn intermediate_realms(
    capaths: &Capaths,
    client: &str,
    server: &str,
) -> Vec<String> {
    let path = realm_path(capaths, client, server);
    if path.len() <= 2 {
        return Vec::new();
    }
    return path[1..path.len() - 1].to_vec();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(realms: &[&str]) -> Vec<String> {
        return realms.iter().map(|r| r.to_string()).collect();
    }

    #[test]
    fn test_sibling_realms() {
        assert_eq!(
            strings(&["A.B.C", "B.C", "D.B.C"]),
            hierarchical_path("A.B.C", "D.B.C")
        );
    }

    #[test]
    fn test_ancestor_realms() {
        assert_eq!(strings(&["B.C", "A.B.C"]), hierarchical_path("B.C", "A.B.C"));
        assert_eq!(strings(&["A.B.C", "B.C"]), hierarchical_path("A.B.C", "B.C"));
    }

    #[test]
    fn test_unrelated_realms() {
        assert_eq!(
            strings(&["EXAMPLE.COM", "COM", "ORG", "OTHER.ORG"]),
            hierarchical_path("EXAMPLE.COM", "OTHER.ORG")
        );
    }

    #[test]
    fn test_same_realm() {
        assert_eq!(strings(&["A.B"]), realm_path(&Capaths::new(), "A.B", "A.B"));
    }

    #[test]
    fn test_capaths_override_hierarchy() {
        let mut capaths = Capaths::new();
        let mut servers = HashMap::new();
        servers.insert("OTHER.ORG".to_string(), strings(&["HUB.NET"]));
        servers.insert("DIRECT.ORG".to_string(), strings(&["."]));
        capaths.insert("EXAMPLE.COM".to_string(), servers);

        assert_eq!(
            strings(&["EXAMPLE.COM", "HUB.NET", "OTHER.ORG"]),
            realm_path(&capaths, "EXAMPLE.COM", "OTHER.ORG")
        );
        assert_eq!(
            strings(&["EXAMPLE.COM", "DIRECT.ORG"]),
            realm_path(&capaths, "EXAMPLE.COM", "DIRECT.ORG")
        );
        assert_eq!(
            strings(&["HUB.NET"]),
            intermediate_realms(&capaths, "EXAMPLE.COM", "OTHER.ORG")
        );
    }
}
