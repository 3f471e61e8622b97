use crate::api::texts::{process_create_text, CreateTextRequest};
use crate::app::AppState;
use crate::db::models::{Node, Role, User};
use crate::db::node_repository::NewNode;
use crate::db::user_repository::NewUser;
use crate::error::AppError;

pub const DEMO_USERNAME: &str = "demo";

/// `(title, body, tags)` of the demo texts.
const DEMO_TEXTS: &[(&str, &str, &[&str])] = &[
    (
        "Welcome to Folio",
        "<p>Folio keeps <strong>texts</strong> and <em>images</em> in a tree of pages. \
         Read more at https://example.com/folio.</p>",
        &["intro", "guide"],
    ),
    (
        "Writing texts",
        "<h2>Formatting</h2><p>Bodies are HTML. Scripts, event handlers and unsafe \
         styles are stripped when a text is saved.</p><script>alert('x')</script>",
        &["guide"],
    ),
    (
        "Organizing the tree",
        "<p>Every node has a slug, unique among its siblings. Paths such as \
         <code>docs/guides</code> are resolved one slug at a time.</p>",
        &["guide", "tree"],
    ),
];

/// `(slug, title, parent slug)` of the demo tree, parents first.
const DEMO_TREE: &[(&str, &str, Option<&str>)] = &[
    ("docs", "Documentation", None),
    ("guides", "Guides", Some("docs")),
    ("about", "About", None),
];

/// What a seeding run created.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SeedReport {
    pub users: usize,
    pub texts: usize,
    pub nodes: usize,
}

async fn ensure_demo_user(state: &AppState, report: &mut SeedReport) -> Result<(User, bool), AppError> {
    if let Some(user) = state.users.find_by_username(DEMO_USERNAME).await? {
        tracing::info!("User '{}' already exists, skipping.", DEMO_USERNAME);
        return Ok((user, false));
    }

    let user = state
        .users
        .create(NewUser {
            username: DEMO_USERNAME.to_string(),
            email: "demo@example.com".to_string(),
            is_staff: true,
        })
        .await?;
    state.users.set_role(user.id, Role::Editor).await?;
    report.users += 1;
    Ok((user, true))
}

async fn ensure_node(
    state: &AppState,
    slug: &str,
    title: &str,
    parent: Option<&Node>,
    created_by: i64,
    report: &mut SeedReport,
) -> Result<Node, AppError> {
    let parent_id = parent.map(|p| p.id);
    if let Some(node) = state.nodes.find_child(parent_id, slug).await? {
        tracing::info!("Node '{}' already exists, skipping.", slug);
        return Ok(node);
    }

    let position = state.nodes.list_children(parent_id, false).await?.len() as i32;
    let node = state
        .nodes
        .insert(NewNode {
            title: title.to_string(),
            slug: slug.to_string(),
            parent_id,
            position,
            is_published: true,
            created_by,
        })
        .await?;
    report.nodes += 1;
    Ok(node)
}

/// Populate an empty database with a demo user, texts and tree.
///
/// Running it again only fills in what is missing.
pub async fn seed_demo_data(state: &AppState) -> Result<SeedReport, AppError> {
    tracing::info!("Starting demo data seeding...");
    let mut report = SeedReport::default();

    let (user, fresh_user) = ensure_demo_user(state, &mut report).await?;

    let mut seeded: Vec<Node> = Vec::new();
    for (slug, title, parent_slug) in DEMO_TREE {
        let parent = parent_slug.and_then(|p| seeded.iter().find(|n| n.slug == p).cloned());
        let node = ensure_node(state, slug, title, parent.as_ref(), user.id, &mut report).await?;
        seeded.push(node);
    }

    // texts have no natural key, so they are only created alongside the user
    if fresh_user {
        let guides = seeded.iter().find(|n| n.slug == "guides").map(|n| n.id);
        for (position, (title, body, tags)) in DEMO_TEXTS.iter().enumerate() {
            let text = process_create_text(
                state.users.as_ref(),
                state.tags.as_ref(),
                state.texts.as_ref(),
                CreateTextRequest {
                    title: title.to_string(),
                    body: body.to_string(),
                    created_by: user.id,
                    tags: tags.iter().map(|t| t.to_string()).collect(),
                },
            )
            .await?;
            if let Some(node_id) = guides {
                state
                    .nodes
                    .attach_text(node_id, text.id, position as i32)
                    .await?;
            }
            report.texts += 1;
        }
    }

    tracing::info!(
        users = report.users,
        texts = report.texts,
        nodes = report.nodes,
        "Demo data seeding complete"
    );
    Ok(report)
}
