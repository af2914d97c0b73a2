use std::sync::Arc;

use async_graphql::{Request, Variables};
use serde_json::{json, Value};

use msa_tracker::db::{MemoryStore, Store};
use msa_tracker::graphql::{build_schema, TrackerSchema};
use msa_tracker::models::member::session::Session;
use msa_tracker::models::member::User;
use msa_tracker::notify::{DiscordNotifier, Notifier};

const ADMIN_USERNAME: &str = "admin";
const ADMIN_PASSWORD: &str = "changeme123";

struct TestApi {
    schema: TrackerSchema,
    store: Arc<dyn Store>,
}

impl TestApi {
    async fn new() -> Self {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let notifier: Arc<dyn Notifier> = Arc::new(DiscordNotifier::disabled());
        User::ensure_admin(ADMIN_USERNAME, ADMIN_PASSWORD, None, store.as_ref())
            .await
            .unwrap();

        Self {
            schema: build_schema(store.clone(), notifier),
            store,
        }
    }

    async fn run(&self, token: Option<&str>, query: &str, variables: Value) -> Value {
        let mut request = Request::new(query).variables(Variables::from_json(variables));
        if let Some(token) = token {
            let user = Session::user_for_token(token, self.store.as_ref())
                .await
                .unwrap();
            request = request.data(user);
        }

        serde_json::to_value(self.schema.execute(request).await).unwrap()
    }

    /// Runs a query that must succeed and returns its data.
    async fn data(&self, token: Option<&str>, query: &str, variables: Value) -> Value {
        let response = self.run(token, query, variables).await;
        assert!(response.get("errors").is_none(), "unexpected errors: {response}");

        response["data"].clone()
    }

    async fn login(&self, username: &str, password: &str) -> String {
        let data = self
            .data(
                None,
                "mutation($username: String!, $password: String!) {
                    login(username: $username, password: $password)
                }",
                json!({ "username": username, "password": password }),
            )
            .await;

        data["login"].as_str().unwrap().to_owned()
    }
}

fn error_code(response: &Value) -> &str {
    response["errors"][0]["extensions"]["code"]
        .as_str()
        .unwrap_or_default()
}

#[tokio::test]
async fn anonymous_users_are_turned_away() {
    let api = TestApi::new().await;

    let response = api.run(None, "{ teams { id } }", json!({})).await;
    assert_eq!(error_code(&response), "UNAUTHORIZED");

    let response = api.run(None, "{ user { id } }", json!({})).await;
    assert_eq!(response["data"]["user"], Value::Null);
}

#[tokio::test]
async fn wrong_password_is_unauthorized() {
    let api = TestApi::new().await;

    let response = api
        .run(
            None,
            r#"mutation { login(username: "admin", password: "letmein") }"#,
            json!({}),
        )
        .await;
    assert_eq!(error_code(&response), "UNAUTHORIZED");
}

#[tokio::test]
async fn admin_plans_a_week_and_member_completes_a_task() {
    let api = TestApi::new().await;
    let admin = api.login(ADMIN_USERNAME, ADMIN_PASSWORD).await;

    let data = api
        .data(
            Some(&admin),
            "mutation($user: NewUser!) { createUser(newUser: $user) { id role } }",
            json!({ "user": {
                "username": "aisha",
                "password": "secret1",
                "displayName": "Aisha",
                "discordId": " 123456789012345678 ",
            }}),
        )
        .await;
    assert_eq!(data["createUser"]["role"], "MEMBER");
    let member_id = data["createUser"]["id"].clone();

    let data = api
        .data(
            Some(&admin),
            "mutation($semester: NewSemester!) { createSemester(newSemester: $semester) { id isActive } }",
            json!({ "semester": {
                "name": "Fall 2024",
                "startDate": "2024-09-01",
                "endDate": "2024-12-20",
            }}),
        )
        .await;
    assert_eq!(data["createSemester"]["isActive"], true);
    let semester_id = data["createSemester"]["id"].clone();

    let data = api
        .data(
            Some(&admin),
            "mutation($semesterId: Int!, $userIds: [Int!]!) {
                addToRoster(semesterId: $semesterId, userIds: $userIds) { added skipped }
            }",
            json!({ "semesterId": semester_id, "userIds": [member_id] }),
        )
        .await;
    assert_eq!(data["addToRoster"], json!({ "added": 1, "skipped": 0 }));

    let data = api
        .data(
            Some(&admin),
            "mutation($week: NewWeek!) { createWeek(newWeek: $week) { id } }",
            json!({ "week": {
                "semesterId": semester_id,
                "weekNumber": 1,
                "startDate": "2024-09-02",
                "endDate": "2024-09-08",
            }}),
        )
        .await;
    let week_id = data["createWeek"]["id"].clone();

    let data = api
        .data(
            Some(&admin),
            "mutation($event: NewEvent!) { createEvent(newEvent: $event) { id name } }",
            json!({ "event": {
                "weekId": week_id,
                "name": "Weekly Halaqa",
                "datetime": "2024-09-04T18:00:00Z",
            }}),
        )
        .await;
    let event_id = data["createEvent"]["id"].clone();

    let data = api
        .data(
            Some(&admin),
            "mutation($task: NewTask!) { createTask(newTask: $task) { id status } }",
            json!({ "task": {
                "eventId": event_id,
                "title": "Bring tea",
                "assignedTo": member_id,
            }}),
        )
        .await;
    assert_eq!(data["createTask"]["status"], "PENDING");
    let task_id = data["createTask"]["id"].clone();

    let member = api.login("aisha", "secret1").await;
    let data = api
        .data(
            Some(&member),
            "{ dashboard { userRole weeks { week { weekNumber } events { event { name } tasks { title } } } } }",
            json!({}),
        )
        .await;
    assert_eq!(data["dashboard"]["userRole"], "MEMBER");
    assert_eq!(
        data["dashboard"]["weeks"][0]["events"][0]["tasks"][0]["title"],
        "Bring tea"
    );

    let data = api
        .data(
            Some(&member),
            "mutation($id: Int!) { markTaskDone(id: $id) { status completedByUser { username } } }",
            json!({ "id": task_id }),
        )
        .await;
    assert_eq!(data["markTaskDone"]["status"], "DONE");
    assert_eq!(data["markTaskDone"]["completedByUser"]["username"], "aisha");

    let data = api
        .data(
            Some(&admin),
            "{ auditLogs(action: \"TASK_DONE\") { total items { userName entityName } } }",
            json!({}),
        )
        .await;
    assert_eq!(data["auditLogs"]["total"], 1);
    assert_eq!(data["auditLogs"]["items"][0]["userName"], "Aisha");
    assert_eq!(data["auditLogs"]["items"][0]["entityName"], "Bring tea");
}

#[tokio::test]
async fn members_cannot_use_admin_operations() {
    let api = TestApi::new().await;
    let admin = api.login(ADMIN_USERNAME, ADMIN_PASSWORD).await;
    api.data(
        Some(&admin),
        r#"mutation { createUser(newUser: { username: "omar", password: "secret2", displayName: "Omar" }) { id } }"#,
        json!({}),
    )
    .await;

    let member = api.login("omar", "secret2").await;
    let response = api
        .run(
            Some(&member),
            r#"mutation { createTeam(newTeam: { name: "Media" }) { id } }"#,
            json!({}),
        )
        .await;
    assert_eq!(error_code(&response), "FORBIDDEN");

    let data = api.data(Some(&member), "{ me { username } }", json!({})).await;
    assert_eq!(data["me"]["username"], "omar");
}

#[tokio::test]
async fn duplicate_team_names_conflict() {
    let api = TestApi::new().await;
    let admin = api.login(ADMIN_USERNAME, ADMIN_PASSWORD).await;

    let data = api
        .data(
            Some(&admin),
            r#"mutation { createTeam(newTeam: { name: " Media " }) { name color } }"#,
            json!({}),
        )
        .await;
    assert_eq!(data["createTeam"], json!({ "name": "Media", "color": "#6B7280" }));

    let response = api
        .run(
            Some(&admin),
            r#"mutation { createTeam(newTeam: { name: "MEDIA" }) { id } }"#,
            json!({}),
        )
        .await;
    assert_eq!(error_code(&response), "CONFLICT");
    assert_eq!(response["errors"][0]["extensions"]["status"], 409);
}

#[tokio::test]
async fn template_catalog_lists_builtins_and_overrides() {
    let api = TestApi::new().await;
    let admin = api.login(ADMIN_USERNAME, ADMIN_PASSWORD).await;

    let data = api
        .data(
            Some(&admin),
            "{ eventTemplates { id isBuiltin isOverridden } weekTemplates { id } }",
            json!({}),
        )
        .await;
    let templates = data["eventTemplates"].as_array().unwrap();
    assert!(templates.iter().any(|template| template["id"] == "sweet_sunday"));
    assert!(templates.iter().all(|template| template["isBuiltin"] == true));
    assert_eq!(data["weekTemplates"].as_array().unwrap().len(), 4);

    let data = api
        .data(
            Some(&admin),
            r#"mutation {
                overrideBuiltinTemplate(builtinId: "halaqa", input: {
                    name: "Halaqa Night",
                    tasks: [{ title: "Make chai" }]
                }) { id name isOverridden tasks { title taskType } }
            }"#,
            json!({}),
        )
        .await;
    assert_eq!(
        data["overrideBuiltinTemplate"],
        json!({
            "id": "halaqa",
            "name": "Halaqa Night",
            "isOverridden": true,
            "tasks": [{ "title": "Make chai", "taskType": "STANDARD" }],
        })
    );

    let data = api
        .data(
            Some(&admin),
            r#"mutation { resetBuiltinTemplate(builtinId: "halaqa") { name isOverridden } }"#,
            json!({}),
        )
        .await;
    assert_eq!(
        data["resetBuiltinTemplate"],
        json!({ "name": "Weekly Halaqa", "isOverridden": false })
    );

    let response = api
        .run(
            Some(&admin),
            r#"mutation { resetBuiltinTemplate(builtinId: "halaqa") { name } }"#,
            json!({}),
        )
        .await;
    assert_eq!(error_code(&response), "NOT_FOUND");
}
