//! Who may do what to a list and the things inside it.
//!
//! Decisions are pure functions over facts the caller has already loaded
//! (the list's owner and visibility, the actor's membership). Existence of
//! the list/content is checked by the caller first and reported as not-found,
//! never as a denial.

use std::fmt;

use axum::http::StatusCode;
use uuid::Uuid;

use rectropic_types::models::Role;

use crate::error::ApiError;

/// What the evaluator needs to know about the list a request touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListFacts {
    pub owner_id: Uuid,
    pub is_public: bool,
    /// The actor's membership role, if they belong to the list.
    pub actor_role: Option<Role>,
}

/// The invitee as resolved from the invite email.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Invitee {
    pub already_member: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ReadList,
    ReadContent,
    AddContent,
    React,
    UpdateList,
    DeleteList,
    /// `None` when the email resolved to nobody.
    Invite { invitee: Option<Invitee> },
    RemoveMember { target: Uuid },
    DeleteContent { added_by: Uuid },
    Leave,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    NotAMember,
    NotOwner,
    CannotRemoveOwner,
    NotContentAuthorOrOwner,
    OwnerCannotLeave,
    UserNotFound,
    AlreadyMember,
}

impl Denial {
    pub fn reason(self) -> &'static str {
        match self {
            Self::NotAMember => "not-a-member",
            Self::NotOwner => "not-owner",
            Self::CannotRemoveOwner => "cannot-remove-owner",
            Self::NotContentAuthorOrOwner => "not-content-author-or-owner",
            Self::OwnerCannotLeave => "owner-cannot-leave",
            Self::UserNotFound => "user-not-found",
            Self::AlreadyMember => "already-member",
        }
    }

    /// Structural refusals (the owner row can't go away) are bad requests
    /// rather than permission failures.
    pub fn status(self) -> StatusCode {
        match self {
            Self::CannotRemoveOwner | Self::OwnerCannotLeave | Self::AlreadyMember => {
                StatusCode::BAD_REQUEST
            }
            Self::UserNotFound => StatusCode::NOT_FOUND,
            Self::NotAMember | Self::NotOwner | Self::NotContentAuthorOrOwner => {
                StatusCode::FORBIDDEN
            }
        }
    }
}

impl fmt::Display for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reason())
    }
}

impl From<Denial> for ApiError {
    fn from(denial: Denial) -> Self {
        match denial {
            Denial::UserNotFound => ApiError::NotFound(denial.reason()),
            Denial::AlreadyMember => ApiError::Conflict(denial.reason()),
            other => ApiError::Forbidden(other),
        }
    }
}

pub fn authorize(actor: Uuid, action: Action, list: &ListFacts) -> Result<(), Denial> {
    let is_member = list.actor_role.is_some();
    let is_owner = actor == list.owner_id;

    match action {
        // Public lists are readable by anyone signed in, never writable.
        Action::ReadList | Action::ReadContent => {
            if is_member || list.is_public {
                Ok(())
            } else {
                Err(Denial::NotAMember)
            }
        }
        Action::AddContent | Action::React => {
            if is_member {
                Ok(())
            } else {
                Err(Denial::NotAMember)
            }
        }
        Action::UpdateList | Action::DeleteList => require_owner(is_owner),
        Action::Invite { invitee } => {
            require_owner(is_owner)?;
            match invitee {
                None => Err(Denial::UserNotFound),
                Some(Invitee { already_member: true }) => Err(Denial::AlreadyMember),
                Some(_) => Ok(()),
            }
        }
        Action::RemoveMember { target } => {
            require_owner(is_owner)?;
            if target == list.owner_id {
                Err(Denial::CannotRemoveOwner)
            } else {
                Ok(())
            }
        }
        Action::DeleteContent { added_by } => {
            if actor == added_by || is_owner {
                Ok(())
            } else {
                Err(Denial::NotContentAuthorOrOwner)
            }
        }
        Action::Leave => {
            if is_owner {
                Err(Denial::OwnerCannotLeave)
            } else if is_member {
                Ok(())
            } else {
                Err(Denial::NotAMember)
            }
        }
    }
}

/// `DELETE /lists/:id/members/:user` by a non-owner on themselves is a leave;
/// everything else is an owner removing someone.
pub fn member_removal(actor: Uuid, target: Uuid, list: &ListFacts) -> Action {
    if actor == target && actor != list.owner_id {
        Action::Leave
    } else {
        Action::RemoveMember { target }
    }
}

fn require_owner(is_owner: bool) -> Result<(), Denial> {
    if is_owner { Ok(()) } else { Err(Denial::NotOwner) }
}
