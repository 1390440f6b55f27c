use serde::{Deserialize, Serialize};
use tour_core::docs::ApiInfo;
use tour_core::middleware::LogMiddleware;
use tour_core::request::{ContentType, Json, PathParam, Query, QueryPairs, State};
use tour_core::route::{RouteGroup, Router};
use tour_core::server::Server;

#[derive(Debug, Deserialize, Serialize)]
struct OwnBody {
    val: String,
}

#[derive(Debug, Deserialize)]
struct Search {
    q: Option<String>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    fn handler() {}

    fn handler_param(PathParam(param): PathParam<String>) -> String {
        param
    }

    fn handler_body(body: String) -> anyhow::Result<String> {
        Ok(body)
    }

    fn handler_json(Json(own_body): Json<OwnBody>) -> Json<OwnBody> {
        Json(own_body)
    }

    fn handler_header(ContentType(content_type): ContentType) -> String {
        content_type
    }

    fn handler_query(Query(search): Query<Search>) -> String {
        search.q.unwrap_or_default()
    }

    fn handler_tags(pairs: QueryPairs) -> String {
        pairs.get_all("tag").collect::<Vec<_>>().join(",")
    }

    fn handler_state(State(state): State<i32>) -> String {
        state.to_string()
    }

    let v1 = RouteGroup::new("/v1").get("/user", || "v1");

    let app = Router::with_state(123)
        .middleware(LogMiddleware)
        .get("/test/<param1>", handler_param)
        .get("/", handler)
        .post("/body", handler_body)
        .post("/json", handler_json)
        .get("/header", handler_header)
        .get("/search", handler_query)
        .get("/tags", handler_tags)
        .get("/state", handler_state)
        .groups(vec![v1])
        .docs(
            "/openapi.json",
            ApiInfo {
                title: "params".into(),
                description: "extractor showcase".into(),
                version: "0.1.0".into(),
            },
        );

    Server::new("127.0.0.1", 8080).with_service(app).run()
}
