use askama::Template;
use axum::extract::{Multipart, Path, Query, State};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;

use crate::catalog::models::{NewPostcard, PostcardUpdate};
use crate::catalog::store::PostcardFilters;
use crate::catalog::{Postcard, PostcardStatus, Tag, ERAS, TYPES};
use crate::error::AppResult;
use crate::extractors::{IncomingFlash, MaybePrincipal, RequireUser};
use crate::flash::{self, FlashKind};
use crate::moderation::{self, CreateAction};
use crate::routes::{filters, render, select_options, PageContext, SelectOption};
use crate::state::AppState;
use crate::users::Principal;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/postcards", get(list))
        .route("/postcards/add", get(add_page).post(add))
        .route("/postcards/{id}", get(detail))
        .route("/postcards/{id}/edit", get(edit_page).post(edit))
        .route("/postcards/{id}/delete", post(delete))
        .route("/postcards/{id}/submit", post(submit))
}

// -- Templates --

#[derive(Template)]
#[template(path = "postcards/list.html")]
struct ListTemplate {
    ctx: PageContext,
    postcards: Vec<Postcard>,
    eras: Vec<SelectOption>,
    types: Vec<SelectOption>,
    manufacturer: String,
    is_posted: bool,
    is_written: bool,
    page: usize,
    prev_query: String,
    next_query: String,
}

#[derive(Template)]
#[template(path = "postcards/detail.html")]
struct DetailTemplate {
    ctx: PageContext,
    postcard: Postcard,
    tags: Vec<Tag>,
    can_edit: bool,
    can_submit: bool,
}

#[derive(Template)]
#[template(path = "postcards/add.html")]
struct AddTemplate {
    ctx: PageContext,
    eras: Vec<SelectOption>,
    types: Vec<SelectOption>,
}

#[derive(Template)]
#[template(path = "postcards/edit.html")]
struct EditTemplate {
    ctx: PageContext,
    postcard: Postcard,
    eras: Vec<SelectOption>,
    types: Vec<SelectOption>,
    tags_value: String,
}

// -- Listing --

#[derive(Deserialize, Default)]
pub struct ListQuery {
    era: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    manufacturer: Option<String>,
    is_posted: Option<String>,
    is_written: Option<String>,
    status: Option<String>,
    page: Option<usize>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// Flag query params are true when present and non-empty, absent otherwise.
fn flag(value: &Option<String>) -> Option<bool> {
    match value {
        Some(s) if !s.is_empty() => Some(true),
        _ => None,
    }
}

/// Translate the query string into the filter set. Non-privileged callers
/// always see only approved postcards; admins may ask for another status.
fn filters_for(query: &ListQuery, requester: Option<&Principal>) -> PostcardFilters {
    let privileged = requester.map(|p| p.is_admin()).unwrap_or(false);
    let status = if privileged {
        query
            .status
            .as_deref()
            .and_then(PostcardStatus::parse)
            .or(Some(PostcardStatus::Approved))
    } else {
        Some(PostcardStatus::Approved)
    };
    PostcardFilters {
        era: non_empty(query.era.clone()),
        kind: non_empty(query.kind.clone()),
        manufacturer: non_empty(query.manufacturer.clone()),
        is_posted: flag(&query.is_posted),
        is_written: flag(&query.is_written),
        status,
    }
}

/// Query string for a pagination link, preserving the active filters.
fn page_query(query: &ListQuery, page: usize) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    if let Some(era) = non_empty(query.era.clone()) {
        serializer.append_pair("era", &era);
    }
    if let Some(kind) = non_empty(query.kind.clone()) {
        serializer.append_pair("type", &kind);
    }
    if let Some(manufacturer) = non_empty(query.manufacturer.clone()) {
        serializer.append_pair("manufacturer", &manufacturer);
    }
    if flag(&query.is_posted).is_some() {
        serializer.append_pair("is_posted", "true");
    }
    if flag(&query.is_written).is_some() {
        serializer.append_pair("is_written", "true");
    }
    serializer.append_pair("page", &page.to_string());
    serializer.finish()
}

async fn list(
    State(state): State<AppState>,
    MaybePrincipal(user): MaybePrincipal,
    IncomingFlash(flash): IncomingFlash,
    Query(query): Query<ListQuery>,
) -> AppResult<Response> {
    let filters_set = filters_for(&query, user.as_ref());
    let page = query.page.unwrap_or(1).max(1);
    let postcards = state.catalog.list(&filters_set, page).await?;

    let ctx = PageContext::new(user, flash);
    let clear = ctx.has_flash();
    let template = ListTemplate {
        eras: select_options(ERAS, filters_set.era.as_deref()),
        types: select_options(TYPES, filters_set.kind.as_deref()),
        manufacturer: filters_set.manufacturer.clone().unwrap_or_default(),
        is_posted: filters_set.is_posted.unwrap_or(false),
        is_written: filters_set.is_written.unwrap_or(false),
        page,
        prev_query: page_query(&query, page.saturating_sub(1).max(1)),
        next_query: page_query(&query, page + 1),
        ctx,
        postcards,
    };
    Ok(render(template, clear))
}

// -- Detail --

async fn detail(
    State(state): State<AppState>,
    MaybePrincipal(user): MaybePrincipal,
    IncomingFlash(flash): IncomingFlash,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let Some(postcard) = state.catalog.get(&id).await? else {
        return Ok(flash::redirect(
            "/postcards",
            FlashKind::Error,
            "Postcard not found",
        ));
    };
    // Hidden postcards are indistinguishable from absent ones.
    if !moderation::can_view(user.as_ref(), &postcard) {
        return Ok(flash::redirect(
            "/postcards",
            FlashKind::Error,
            "Postcard not found",
        ));
    }

    let tags = state.tags.for_postcard(&id).await?;
    let can_edit = user
        .as_ref()
        .map(|p| moderation::can_mutate(p, &postcard))
        .unwrap_or(false);
    let can_submit = can_edit && postcard.status == PostcardStatus::Draft;

    let ctx = PageContext::new(user, flash);
    let clear = ctx.has_flash();
    Ok(render(
        DetailTemplate {
            ctx,
            postcard,
            tags,
            can_edit,
            can_submit,
        },
        clear,
    ))
}

// -- Multipart form --

struct UploadedFile {
    filename: String,
    content_type: String,
    bytes: Vec<u8>,
}

#[derive(Default)]
struct PostcardForm {
    title: String,
    description: String,
    era: String,
    manufacturer: String,
    kind: String,
    is_posted: bool,
    is_written: bool,
    tags: String,
    action: String,
    front_image: Option<UploadedFile>,
    back_image: Option<UploadedFile>,
}

async fn read_postcard_form(mut multipart: Multipart) -> AppResult<PostcardForm> {
    let mut form = PostcardForm::default();
    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        match name.as_str() {
            "front_image" | "back_image" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                if filename.is_empty() {
                    continue;
                }
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field.bytes().await?.to_vec();
                let file = UploadedFile {
                    filename,
                    content_type,
                    bytes,
                };
                if name == "front_image" {
                    form.front_image = Some(file);
                } else {
                    form.back_image = Some(file);
                }
            }
            // Checkbox presence means true.
            "is_posted" => form.is_posted = true,
            "is_written" => form.is_written = true,
            _ => {
                let text = field.text().await?;
                match name.as_str() {
                    "title" => form.title = text.trim().to_string(),
                    "description" => form.description = text,
                    "era" => form.era = text,
                    "manufacturer" => form.manufacturer = text,
                    "type" => form.kind = text,
                    "tags" => form.tags = text,
                    "action" => form.action = text,
                    _ => {}
                }
            }
        }
    }
    Ok(form)
}

/// Upload one image, degrading to no URL on failure (disallowed extension
/// or storage error), matching the record-first-or-nothing-at-all shape of
/// the rest of the app.
async fn save_upload(state: &AppState, file: UploadedFile) -> Option<String> {
    match state
        .storage
        .save(&file.filename, &file.content_type, file.bytes)
        .await
    {
        Ok(url) => url,
        Err(e) => {
            tracing::error!("Error saving image: {}", e);
            None
        }
    }
}

// -- Create --

async fn add_page(
    State(_state): State<AppState>,
    RequireUser(user): RequireUser,
    IncomingFlash(flash): IncomingFlash,
) -> AppResult<Response> {
    let ctx = PageContext::new(Some(user), flash);
    let clear = ctx.has_flash();
    Ok(render(
        AddTemplate {
            ctx,
            eras: select_options(ERAS, None),
            types: select_options(TYPES, None),
        },
        clear,
    ))
}

async fn add(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    multipart: Multipart,
) -> AppResult<Response> {
    let form = read_postcard_form(multipart).await?;
    if form.title.is_empty() {
        return Ok(flash::redirect(
            "/postcards/add",
            FlashKind::Error,
            "Title is required",
        ));
    }
    let action = CreateAction::parse(&form.action).unwrap_or(CreateAction::Draft);

    let mut front_image_url = None;
    let mut back_image_url = None;
    if let Some(file) = form.front_image {
        front_image_url = save_upload(&state, file).await;
    }
    if let Some(file) = form.back_image {
        back_image_url = save_upload(&state, file).await;
    }

    let new = NewPostcard {
        id: uuid::Uuid::new_v4().to_string(),
        title: form.title,
        description: non_empty(Some(form.description)),
        era: non_empty(Some(form.era)),
        manufacturer: non_empty(Some(form.manufacturer)),
        kind: non_empty(Some(form.kind)),
        is_posted: form.is_posted,
        is_written: form.is_written,
        front_image_url: front_image_url.clone(),
        back_image_url: back_image_url.clone(),
        user_id: user.id.clone(),
        status: action.initial_status(),
    };

    let postcard = match state.catalog.create(&new).await {
        Ok(postcard) => postcard,
        Err(e) => {
            tracing::error!("Failed to create postcard: {}", e);
            // Compensate for the already-uploaded images; best effort only.
            if let Some(ref url) = front_image_url {
                state.storage.delete(url).await;
            }
            if let Some(ref url) = back_image_url {
                state.storage.delete(url).await;
            }
            return Ok(flash::redirect(
                "/postcards/add",
                FlashKind::Error,
                "Failed to add postcard",
            ));
        }
    };

    state.tags.attach(&postcard.id, &form.tags).await?;

    let message = match action {
        CreateAction::Submit => "Postcard submitted for review",
        CreateAction::Draft => "Postcard added successfully",
    };
    Ok(flash::redirect(
        &format!("/postcards/{}", postcard.id),
        FlashKind::Success,
        message,
    ))
}

// -- Edit --

/// Load a postcard and apply the mutation gate. Absent and forbidden are
/// both reported, with distinct messages, as redirects to the catalog.
async fn load_for_mutation(
    state: &AppState,
    id: &str,
    user: &Principal,
    denied_message: &str,
) -> AppResult<Result<Postcard, Response>> {
    let Some(postcard) = state.catalog.get(id).await? else {
        return Ok(Err(flash::redirect(
            "/postcards",
            FlashKind::Error,
            "Postcard not found",
        )));
    };
    if !moderation::can_mutate(user, &postcard) {
        return Ok(Err(flash::redirect(
            "/postcards",
            FlashKind::Error,
            denied_message,
        )));
    }
    Ok(Ok(postcard))
}

async fn edit_page(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    IncomingFlash(flash): IncomingFlash,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let postcard = match load_for_mutation(
        &state,
        &id,
        &user,
        "You do not have permission to edit this postcard",
    )
    .await?
    {
        Ok(postcard) => postcard,
        Err(response) => return Ok(response),
    };

    let tags = state.tags.for_postcard(&id).await?;
    let tags_value = tags
        .iter()
        .map(|t| t.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    let ctx = PageContext::new(Some(user), flash);
    let clear = ctx.has_flash();
    Ok(render(
        EditTemplate {
            ctx,
            eras: select_options(ERAS, postcard.era.as_deref()),
            types: select_options(TYPES, postcard.kind.as_deref()),
            postcard,
            tags_value,
        },
        clear,
    ))
}

async fn edit(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<String>,
    multipart: Multipart,
) -> AppResult<Response> {
    let postcard = match load_for_mutation(
        &state,
        &id,
        &user,
        "You do not have permission to edit this postcard",
    )
    .await?
    {
        Ok(postcard) => postcard,
        Err(response) => return Ok(response),
    };

    let form = read_postcard_form(multipart).await?;
    if form.title.is_empty() {
        return Ok(flash::redirect(
            &format!("/postcards/{}/edit", id),
            FlashKind::Error,
            "Title is required",
        ));
    }

    // A replacement upload deletes the old object first (best effort).
    let mut front_image_url = postcard.front_image_url.clone();
    let mut back_image_url = postcard.back_image_url.clone();
    if let Some(file) = form.front_image {
        if let Some(ref old) = front_image_url {
            state.storage.delete(old).await;
        }
        front_image_url = save_upload(&state, file).await;
    }
    if let Some(file) = form.back_image {
        if let Some(ref old) = back_image_url {
            state.storage.delete(old).await;
        }
        back_image_url = save_upload(&state, file).await;
    }

    let update = PostcardUpdate {
        title: form.title,
        description: non_empty(Some(form.description)),
        era: non_empty(Some(form.era)),
        manufacturer: non_empty(Some(form.manufacturer)),
        kind: non_empty(Some(form.kind)),
        is_posted: form.is_posted,
        is_written: form.is_written,
        front_image_url,
        back_image_url,
    };

    match state.catalog.update(&id, &update).await {
        Ok(Some(_)) => Ok(flash::redirect(
            &format!("/postcards/{}", id),
            FlashKind::Success,
            "Postcard updated successfully",
        )),
        Ok(None) => Ok(flash::redirect(
            "/postcards",
            FlashKind::Error,
            "Postcard not found",
        )),
        Err(e) => {
            tracing::error!("Failed to update postcard {}: {}", id, e);
            Ok(flash::redirect(
                &format!("/postcards/{}/edit", id),
                FlashKind::Error,
                "Failed to update postcard",
            ))
        }
    }
}

// -- Delete --

/// Image URLs a record holds, in storage-cleanup order.
fn stored_image_urls(postcard: &Postcard) -> Vec<&str> {
    [
        postcard.front_image_url.as_deref(),
        postcard.back_image_url.as_deref(),
    ]
    .into_iter()
    .flatten()
    .collect()
}

async fn delete(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let postcard = match load_for_mutation(
        &state,
        &id,
        &user,
        "You do not have permission to delete this postcard",
    )
    .await?
    {
        Ok(postcard) => postcard,
        Err(response) => return Ok(response),
    };

    // Asset cleanup first; a failed object delete leaves an orphan rather
    // than blocking the record delete.
    for url in stored_image_urls(&postcard) {
        state.storage.delete(url).await;
    }

    state.catalog.delete(&id).await?;

    Ok(flash::redirect(
        "/postcards",
        FlashKind::Success,
        "Postcard deleted successfully",
    ))
}

// -- Submit for review --

async fn submit(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let postcard = match load_for_mutation(
        &state,
        &id,
        &user,
        "You do not have permission to submit this postcard",
    )
    .await?
    {
        Ok(postcard) => postcard,
        Err(response) => return Ok(response),
    };

    let next = match moderation::submit(postcard.status) {
        Ok(next) => next,
        Err(e) => {
            return Ok(flash::redirect(
                &format!("/postcards/{}", id),
                FlashKind::Error,
                &e.to_string(),
            ));
        }
    };
    state.catalog.set_status(&id, next, None).await?;

    Ok(flash::redirect(
        &format!("/postcards/{}", id),
        FlashKind::Success,
        "Postcard submitted for review",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::Role;

    fn principal(role: Role) -> Principal {
        Principal {
            id: "u-1".into(),
            username: "alice".into(),
            email: "alice@example.com".into(),
            role,
        }
    }

    #[test]
    fn anonymous_listing_is_forced_to_approved() {
        let query = ListQuery {
            status: Some("draft".into()),
            ..Default::default()
        };
        let filters = filters_for(&query, None);
        assert_eq!(filters.status, Some(PostcardStatus::Approved));
    }

    #[test]
    fn regular_user_listing_is_forced_to_approved() {
        let query = ListQuery {
            status: Some("staged".into()),
            ..Default::default()
        };
        let filters = filters_for(&query, Some(&principal(Role::User)));
        assert_eq!(filters.status, Some(PostcardStatus::Approved));
    }

    #[test]
    fn admin_may_request_another_status() {
        let query = ListQuery {
            status: Some("staged".into()),
            ..Default::default()
        };
        let filters = filters_for(&query, Some(&principal(Role::Admin)));
        assert_eq!(filters.status, Some(PostcardStatus::Staged));
    }

    #[test]
    fn admin_without_explicit_status_sees_approved() {
        let filters = filters_for(&ListQuery::default(), Some(&principal(Role::Admin)));
        assert_eq!(filters.status, Some(PostcardStatus::Approved));
    }

    #[test]
    fn empty_filter_params_do_not_filter() {
        let query = ListQuery {
            era: Some("".into()),
            manufacturer: Some("  ".into()),
            ..Default::default()
        };
        let filters = filters_for(&query, None);
        assert!(filters.era.is_none());
        assert!(filters.manufacturer.is_none());
    }

    #[test]
    fn flag_params_count_as_true_when_non_empty() {
        assert_eq!(flag(&Some("true".into())), Some(true));
        assert_eq!(flag(&Some("on".into())), Some(true));
        assert_eq!(flag(&Some("".into())), None);
        assert_eq!(flag(&None), None);
    }

    fn postcard_with_images(front: Option<String>, back: Option<String>) -> Postcard {
        Postcard {
            id: "p-1".into(),
            title: "Pier at night".into(),
            description: None,
            era: None,
            manufacturer: None,
            kind: None,
            is_posted: false,
            is_written: false,
            front_image_url: front,
            back_image_url: back,
            user_id: "u-1".into(),
            status: PostcardStatus::Draft,
            review_notes: None,
            created_at: String::new(),
        }
    }

    #[test]
    fn record_deletion_targets_each_stored_object() {
        use crate::backend::StorageClient;

        let storage = StorageClient::new("https://backend.test", "key", "postcard-images");
        let front = storage.public_url("front-key.png");
        let back = storage.public_url("back-key.jpg");
        let card = postcard_with_images(Some(front.clone()), Some(back.clone()));

        let urls = stored_image_urls(&card);
        assert_eq!(urls, vec![front.as_str(), back.as_str()]);

        // Each cleanup URL resolves back to exactly the stored object key.
        let keys: Vec<_> = urls
            .iter()
            .filter_map(|url| storage.key_from_url(url))
            .collect();
        assert_eq!(keys, vec!["front-key.png", "back-key.jpg"]);
    }

    #[test]
    fn record_without_images_needs_no_cleanup() {
        assert!(stored_image_urls(&postcard_with_images(None, None)).is_empty());
        let card = postcard_with_images(None, Some("https://backend.test/x.png".into()));
        assert_eq!(stored_image_urls(&card).len(), 1);
    }

    #[test]
    fn page_query_preserves_filters_and_encodes_values() {
        let query = ListQuery {
            era: Some("1920s".into()),
            kind: Some("Divided Back".into()),
            ..Default::default()
        };
        assert_eq!(
            page_query(&query, 2),
            "era=1920s&type=Divided+Back&page=2"
        );
    }
}
