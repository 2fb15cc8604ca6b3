use hyper::Method;

/// Endpoints exposed by the ingress listener.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Route {
    /// `POST /table/{tableName}/object`
    IngestObject { table: String },
    /// `GET /health`
    Health,
}

/// Match a request against the fixed route table.
///
/// The table segment is extracted as-is; validation against the registry
/// happens in the handler so rejections can carry the proper error.
pub fn match_route(method: &Method, path: &str) -> Option<Route> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    match segments.as_slice() {
        ["table", table, "object"] if *method == Method::POST => Some(Route::IngestObject {
            table: (*table).to_string(),
        }),
        ["health"] if *method == Method::GET => Some(Route::Health),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ingest_route_extracts_the_table_segment() {
        assert_eq!(
            match_route(&Method::POST, "/table/myTable/object"),
            Some(Route::IngestObject {
                table: "myTable".to_string()
            })
        );
    }

    #[test]
    fn trailing_slash_is_tolerated() {
        assert_eq!(
            match_route(&Method::POST, "/table/myTable/object/"),
            Some(Route::IngestObject {
                table: "myTable".to_string()
            })
        );
    }

    #[test]
    fn health_is_get_only() {
        assert_eq!(match_route(&Method::GET, "/health"), Some(Route::Health));
        assert_eq!(match_route(&Method::POST, "/health"), None);
    }

    #[test]
    fn unknown_shapes_do_not_match() {
        assert_eq!(match_route(&Method::GET, "/table/myTable/object"), None);
        assert_eq!(match_route(&Method::POST, "/table/object"), None);
        assert_eq!(match_route(&Method::POST, "/table/a/b/object"), None);
        assert_eq!(match_route(&Method::POST, "/"), None);
    }
}
