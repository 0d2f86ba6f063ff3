use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use rectropic_db::models::{ListChanges, ListRow, MemberRow, UserRow};
use rectropic_db::{ordering, queries};
use rectropic_types::api::{
    CreateListRequest, InviteRequest, ListDetail, ListSummary, UpdateListRequest,
};
use rectropic_types::models::Role;

use crate::access::{self, Action, Invitee, ListFacts};
use crate::auth::AppState;
use crate::error::ApiError;
use crate::middleware::Actor;
use crate::quota;
use crate::store;
use crate::validate;
use crate::views::{self, now_millis};

type ListPath = WithRejection<Path<Uuid>, ApiError>;

/// The list row and its owner membership are written in one transaction.
pub async fn create_list(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    WithRejection(Json(req), _): WithRejection<Json<CreateListRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let title = validate::list_title(&req.title)?;
    let description = validate::blank_to_none(req.description);
    let is_public = req.is_public;

    let list = store::run(&state, move |db| {
        db.with_tx(|tx| {
            let user = store::actor_user(tx, actor.user_id)?;
            let owned = queries::count_owned_lists(tx, &user.id)?;
            quota::check_list_creation(user.is_premium, owned)?;

            let now = now_millis();
            let list = ListRow {
                id: Uuid::new_v4().to_string(),
                title,
                description,
                owner_id: user.id.clone(),
                is_public,
                created_at: now,
                updated_at: now,
            };
            queries::insert_list(tx, &list)?;
            queries::insert_member(
                tx,
                &MemberRow {
                    id: Uuid::new_v4().to_string(),
                    list_id: list.id.clone(),
                    user_id: user.id,
                    role: Role::Owner.as_str().to_string(),
                    joined_at: now,
                },
            )?;
            Ok(list)
        })
    })
    .await?;

    info!("User {} created list {}", actor.user_id, list.id);
    Ok((StatusCode::CREATED, Json(json!({ "list": views::list(&list)? }))))
}

/// The caller's lists, each with their role and the newest content as a
/// thumbnail.
pub async fn get_lists(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<impl IntoResponse, ApiError> {
    let uid = actor.user_id.to_string();

    let (memberships, latest, owners) = store::run(&state, move |db| {
        db.with_conn(|conn| {
            let memberships = queries::lists_for_member(conn, &uid)?;

            let mut latest = HashMap::new();
            for m in &memberships {
                if let Some(c) = ordering::latest_content(conn, &m.list.id)? {
                    latest.insert(m.list.id.clone(), c);
                }
            }

            let owner_ids: Vec<String> = memberships.iter().map(|m| m.list.owner_id.clone()).collect();
            let owners = users_by_id(queries::get_users_by_ids(conn, &owner_ids)?);

            Ok::<_, ApiError>((memberships, latest, owners))
        })
    })
    .await?;

    let lists = memberships
        .iter()
        .map(|m| {
            Ok(ListSummary {
                list: views::list(&m.list)?,
                role: m.role.parse()?,
                owner: owners.get(&m.list.owner_id).map(views::public_user).transpose()?,
                latest_content: latest.get(&m.list.id).map(views::content).transpose()?,
            })
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(Json(json!({ "lists": lists })))
}

/// Full list view: members, and every content in feed order with its
/// reactions and author.
pub async fn get_list(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    WithRejection(Path(list_id), _): ListPath,
) -> Result<impl IntoResponse, ApiError> {
    let detail = store::run(&state, move |db| {
        db.with_conn(|conn| {
            let list = store::list(conn, list_id)?;
            let facts = store::list_facts(conn, &list, actor.user_id)?;
            access::authorize(actor.user_id, Action::ReadList, &facts)?;

            let members = queries::members_of(conn, &list.id)?;
            let contents = ordering::feed(conn, &list.id)?;

            let content_ids: Vec<String> = contents.iter().map(|c| c.id.clone()).collect();
            let reactions = queries::reactions_for_contents(conn, &content_ids)?;

            let mut user_ids: Vec<String> = members.iter().map(|m| m.user_id.clone()).collect();
            user_ids.extend(contents.iter().map(|c| c.added_by.clone()));
            user_ids.push(list.owner_id.clone());
            user_ids.sort();
            user_ids.dedup();
            let users = users_by_id(queries::get_users_by_ids(conn, &user_ids)?);

            let mut reactions_by_content: HashMap<&str, Vec<_>> = HashMap::new();
            for r in &reactions {
                reactions_by_content.entry(r.content_id.as_str()).or_default().push(r);
            }

            let contents = contents
                .iter()
                .map(|c| {
                    let mut view = views::content(c)?;
                    view.added_by_user = users.get(&c.added_by).map(views::public_user).transpose()?;
                    view.reactions = reactions_by_content
                        .get(c.id.as_str())
                        .map(|rs| rs.iter().map(|r| views::reaction(r)).collect::<anyhow::Result<Vec<_>>>())
                        .transpose()?
                        .unwrap_or_default();
                    Ok(view)
                })
                .collect::<anyhow::Result<Vec<_>>>()?;

            let members = members
                .iter()
                .map(|m| views::member(m, users.get(&m.user_id)))
                .collect::<anyhow::Result<Vec<_>>>()?;

            let mut detail = ListDetail {
                list: views::list(&list)?,
                owner: users.get(&list.owner_id).map(views::public_user).transpose()?,
                members,
                contents,
                user_role: facts.actor_role,
            };
            if facts.actor_role.is_none() {
                hide_emails(&mut detail);
            }
            Ok::<_, ApiError>(detail)
        })
    })
    .await?;

    Ok(Json(json!({ "list": detail })))
}

pub async fn update_list(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    WithRejection(Path(list_id), _): ListPath,
    WithRejection(Json(req), _): WithRejection<Json<UpdateListRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let changes = ListChanges {
        title: req.title.as_deref().map(validate::list_title).transpose()?,
        description: req.description.map(|d| validate::blank_to_none(Some(d))),
        is_public: req.is_public,
    };

    let list = store::run(&state, move |db| {
        db.with_tx(|tx| {
            let list = store::list(tx, list_id)?;
            let facts = store::list_facts(tx, &list, actor.user_id)?;
            access::authorize(actor.user_id, Action::UpdateList, &facts)?;

            queries::update_list(tx, &list.id, &changes, now_millis())?;
            store::list(tx, list_id)
        })
    })
    .await?;

    Ok(Json(json!({ "list": views::list(&list)? })))
}

pub async fn delete_list(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    WithRejection(Path(list_id), _): ListPath,
) -> Result<impl IntoResponse, ApiError> {
    store::run(&state, move |db| {
        db.with_tx(|tx| {
            let list = store::list(tx, list_id)?;
            let facts = store::list_facts(tx, &list, actor.user_id)?;
            access::authorize(actor.user_id, Action::DeleteList, &facts)?;

            queries::delete_list(tx, &list.id)?;
            Ok(())
        })
    })
    .await?;

    info!("User {} deleted list {}", actor.user_id, list_id);
    Ok(Json(json!({ "success": true })))
}

pub async fn invite_member(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    WithRejection(Path(list_id), _): ListPath,
    WithRejection(Json(req), _): WithRejection<Json<InviteRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let email = validate::email(&req.email)?;

    let (member, invitee) = store::run(&state, move |db| {
        db.with_tx(|tx| {
            let list = store::list(tx, list_id)?;
            let facts = store::list_facts(tx, &list, actor.user_id)?;

            let invitee = queries::get_user_by_email(tx, &email)?;
            let already_member = match &invitee {
                Some(u) => queries::get_membership(tx, &list.id, &u.id)?.is_some(),
                None => false,
            };
            access::authorize(
                actor.user_id,
                Action::Invite {
                    invitee: invitee.as_ref().map(|_| Invitee { already_member }),
                },
                &facts,
            )?;
            let invitee = invitee.ok_or(ApiError::NotFound("user-not-found"))?;

            let member = MemberRow {
                id: Uuid::new_v4().to_string(),
                list_id: list.id.clone(),
                user_id: invitee.id.clone(),
                role: Role::Member.as_str().to_string(),
                joined_at: now_millis(),
            };
            queries::insert_member(tx, &member)?;
            Ok((member, invitee))
        })
    })
    .await?;

    info!("User {} invited {} to list {}", actor.user_id, invitee.id, list_id);
    Ok(Json(json!({ "member": views::member(&member, Some(&invitee))? })))
}

/// Owner removing a member, or a member removing themselves (leaving).
pub async fn remove_member(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    WithRejection(Path((list_id, target)), _): WithRejection<Path<(Uuid, Uuid)>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    drop_membership(&state, actor, list_id, target, access::member_removal).await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn leave_list(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    WithRejection(Path(list_id), _): ListPath,
) -> Result<impl IntoResponse, ApiError> {
    drop_membership(&state, actor, list_id, actor.user_id, |_, _, _| Action::Leave).await?;
    Ok(Json(json!({ "success": true })))
}

/// `classify` picks the action to authorize: `member_removal` for the members
/// route, always `Leave` for the leave route.
async fn drop_membership(
    state: &AppState,
    actor: Actor,
    list_id: Uuid,
    target: Uuid,
    classify: fn(Uuid, Uuid, &ListFacts) -> Action,
) -> Result<(), ApiError> {
    store::run(state, move |db| {
        db.with_tx(|tx| {
            let list = store::list(tx, list_id)?;
            let facts = store::list_facts(tx, &list, actor.user_id)?;
            let action = classify(actor.user_id, target, &facts);
            access::authorize(actor.user_id, action, &facts)?;

            if !queries::delete_member(tx, &list.id, &target.to_string())? {
                return Err(ApiError::NotFound("member-not-found"));
            }
            Ok(())
        })
    })
    .await?;

    if actor.user_id == target {
        info!("User {} left list {}", target, list_id);
    } else {
        info!("User {} removed {} from list {}", actor.user_id, target, list_id);
    }
    Ok(())
}

/// Outsiders reading a public list see who is in it, not how to reach them.
fn hide_emails(detail: &mut ListDetail) {
    let members = detail.members.iter_mut().filter_map(|m| m.user.as_mut());
    let authors = detail.contents.iter_mut().filter_map(|c| c.added_by_user.as_mut());
    for user in detail.owner.iter_mut().chain(members).chain(authors) {
        user.email = None;
    }
}

fn users_by_id(rows: Vec<UserRow>) -> HashMap<String, UserRow> {
    rows.into_iter().map(|u| (u.id.clone(), u)).collect()
}
