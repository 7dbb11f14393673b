//! Logging in, presence, profiles and the disconnect procedure.

use playground_db::{Batch, Store, keys};
use playground_types::packets::{
    AddEmailPacket, EmailCodePacket, JoinPacket, LeavePacket, RegisterPacket, SettingsPacket,
    StatusPacket,
};
use playground_types::record::field;
use playground_types::{Character, ConnectionId, ErrorCode, HashRecord, Packet, Role};
use rand::Rng;

use super::{Completion, Hub};
use crate::auth;
use crate::error::CoreError;
use crate::services::{ServiceError, SsoProfile};
use crate::world::{self, load_character, new_id, save_character};

/// Exclusive upper bound of email login codes.
const LOGIN_CODE_RANGE: u32 = 1_000_000;

/// Suffix appended to an organizer's registered name.
const ORGANIZER_SUFFIX: &str = "Organizer";

/// Normalized form of an email address.
fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Friends and teammates of `id`, the recipients of its presence changes.
async fn status_recipients(store: &dyn Store, id: &str) -> Result<(Vec<String>, Vec<String>), CoreError> {
    let friends = store.smembers(&keys::friends(id)).await?;
    let teammates = store.smembers(&keys::teammates(id)).await?;
    Ok((friends, teammates))
}

/// A `join`/`auth` waiting on its SSO exchange.
pub(super) struct SsoLogin {
    sender: ConnectionId,
    packet: JoinPacket,
    join: bool,
    exchange: Result<SsoProfile, ServiceError>,
}

impl Hub {
    /// `join` and `auth`.
    ///
    /// Both bind the connection and announce the character online; `join`
    /// also places it in its room, replies `init` and broadcasts the join so
    /// older connections for the same character are dropped on every node.
    ///
    /// An SSO token is redeemed off the hub loop; the connection is bound
    /// once the exchange comes back through [`Hub::finish_sso`].
    pub(super) async fn login(&mut self, sender: ConnectionId, p: JoinPacket, join: bool) -> Result<(), CoreError> {
        if !p.quill_token.is_empty() {
            self.spawn_sso(sender, p, join);
            return Ok(());
        }
        let resolved = self.authenticate(&p).await?;
        self.bind(sender, p, join, resolved).await
    }

    fn spawn_sso(&self, sender: ConnectionId, packet: JoinPacket, join: bool) {
        let sso = self.ctx.services.sso.clone();
        let completions = self.completions.clone();
        tokio::spawn(async move {
            let exchange = sso.exchange(&packet.quill_token).await;
            let done = Completion::Sso(Box::new(SsoLogin {
                sender,
                packet,
                join,
                exchange,
            }));
            if completions.send(done).await.is_err() {
                tracing::debug!(connection = %sender, "Hub stopped before the SSO exchange finished");
            }
        });
    }

    /// Finish a `join`/`auth` whose SSO exchange has come back.
    pub(super) async fn finish_sso(&mut self, done: SsoLogin) -> Result<(), CoreError> {
        let SsoLogin {
            sender,
            packet,
            join,
            exchange,
        } = done;
        if !self.connections.contains_key(&sender) {
            tracing::debug!(connection = %sender, "Connection closed during SSO exchange");
            return Ok(());
        }
        let resolved = self.sso_character(exchange).await?;
        self.bind(sender, packet, join, resolved).await
    }

    /// Bind `sender` to the character its credentials resolved to, or
    /// reply `error{code: 1}` when they were rejected.
    async fn bind(
        &mut self,
        sender: ConnectionId,
        mut p: JoinPacket,
        join: bool,
        resolved: Option<(Character, bool)>,
    ) -> Result<(), CoreError> {
        let Some((mut character, first_time)) = resolved else {
            tracing::debug!(connection = %sender, "Login rejected");
            self.send_to(sender, &Packet::error(ErrorCode::BAD_LOGIN));
            return Ok(());
        };
        if character.id.is_empty() {
            tracing::error!(connection = %sender, "Refusing to bind a character without an id");
            return Ok(());
        }

        let store = self.ctx.store.clone();
        let ingest = self.ctx.ingest.as_str().to_owned();
        let id = character.id.clone();

        let mut batch = Batch::new();
        let init = if join {
            let mut init = world::init_packet(
                store.as_ref(),
                &self.ctx.secrets.jwt_secret,
                &id,
                &character.room,
                true,
            )
            .await?;
            init.first_time = first_time;
            batch = batch.sadd(keys::room_characters(&character.room), id.as_str());
            Some(init)
        } else {
            None
        };

        ingest.clone_into(&mut character.ingest);
        store
            .apply(
                batch
                    .sadd(keys::ingest_characters(&ingest), id.as_str())
                    .hset_one(keys::character(&id), "ingest", ingest.as_str())
                    .set(keys::character_active(&id), "true"),
            )
            .await?;

        let (friend_ids, teammate_ids) = status_recipients(store.as_ref(), &id).await?;
        self.broadcast(Packet::Status(StatusPacket {
            id: id.clone(),
            active: true,
            online: true,
            friend_ids,
            teammate_ids,
        }))
        .await?;

        self.evict(&id, Some(sender));
        if let Some(conn) = self.connections.get_mut(&sender) {
            conn.character = Some(character.clone());
        }
        tracing::info!(connection = %sender, character = %id, join, first_time, "Character bound");

        if let Some(init) = init {
            self.send_to(sender, &Packet::Init(init));

            p.room.clone_from(&character.room);
            p.character = Some(character);
            p.client_id = sender.to_string();
            p.name.clear();
            p.quill_token.clear();
            p.token.clear();
            p.email.clear();
            p.code = 0;
            self.broadcast(Packet::Join(p)).await?;
        }
        Ok(())
    }

    /// Resolve a bearer token or an email login to a character, creating it
    /// on first login. `None` means the credentials were rejected.
    async fn authenticate(&self, p: &JoinPacket) -> Result<Option<(Character, bool)>, CoreError> {
        if !p.token.is_empty() {
            let Ok(id) = auth::verify_token(&self.ctx.secrets.jwt_secret, &p.token) else {
                return Ok(None);
            };
            let character = load_character(self.ctx.store.as_ref(), &id).await?;
            return Ok(character.map(|c| (c, false)));
        }
        if !p.email.is_empty() {
            return self.authenticate_email(&normalize_email(&p.email), p.code).await;
        }
        Ok(None)
    }

    /// The character behind a redeemed SSO token, created on first login.
    async fn sso_character(
        &self,
        exchange: Result<SsoProfile, ServiceError>,
    ) -> Result<Option<(Character, bool)>, CoreError> {
        let store = self.ctx.store.as_ref();
        let profile = match exchange {
            Ok(profile) => profile,
            Err(e) => {
                tracing::warn!(error = %e, "SSO exchange failed");
                return Ok(None);
            }
        };
        if !profile.admitted || !profile.confirmed {
            tracing::info!(sso_id = %profile.id, "Applicant is not admitted and confirmed");
            return Ok(None);
        }

        if let Some(existing) = store.hget(keys::QUILL_TO_CHARACTER, &profile.id).await? {
            if let Some(character) = load_character(store, &existing).await? {
                return Ok(Some((character, false)));
            }
        }

        let mut character = Character::new(new_id(), profile.name, Role::Hacker);
        character.email = normalize_email(&profile.email);
        character.school = profile.school;
        character.grad_year = profile.grad_year;
        character.is_college = profile.is_college;

        store
            .apply(
                save_character(Batch::new(), &character)
                    .hset_one(keys::QUILL_TO_CHARACTER, profile.id, character.id.as_str())
                    .hset_one(keys::EMAIL_TO_CHARACTER, character.email.as_str(), character.id.as_str()),
            )
            .await?;
        tracing::info!(character = %character.id, "Created character from SSO profile");
        Ok(Some((character, true)))
    }

    async fn authenticate_email(&self, email: &str, code: u32) -> Result<Option<(Character, bool)>, CoreError> {
        let store = self.ctx.store.as_ref();
        let request = format!("{email},{code}");
        if !store.sismember(keys::LOGIN_REQUESTS, &request).await? {
            return Ok(None);
        }
        store.apply(Batch::new().srem(keys::LOGIN_REQUESTS, request)).await?;

        if let Some(existing) = store.hget(keys::EMAIL_TO_CHARACTER, email).await? {
            if let Some(character) = load_character(store, &existing).await? {
                return Ok(Some((character, false)));
            }
        }

        let mut character = Character::new(new_id(), "Player", Role::Guest);
        character.email = email.to_owned();
        for role in [Role::SponsorRep, Role::Mentor, Role::Organizer] {
            let Some(list) = role.allow_list_key() else {
                continue;
            };
            if store.sismember(list, email).await? {
                character.role = role;
                break;
            }
        }
        if character.role == Role::SponsorRep {
            character.sponsor_id = store
                .hget(keys::EMAIL_TO_SPONSOR, email)
                .await?
                .unwrap_or_default();
        }

        store
            .apply(
                save_character(Batch::new(), &character)
                    .hset_one(keys::EMAIL_TO_CHARACTER, email, character.id.as_str()),
            )
            .await?;
        tracing::info!(character = %character.id, role = ?character.role, "Created character from email login");
        Ok(Some((character, true)))
    }

    /// `email_code`: mail a one-time login code to an allow-listed address.
    pub(super) async fn email_code(&mut self, p: EmailCodePacket) -> Result<(), CoreError> {
        let Some(list) = p.role.allow_list_key() else {
            return Ok(());
        };
        let email = normalize_email(&p.email);
        if !self.ctx.store.sismember(list, &email).await? {
            tracing::debug!("Login code requested for an address not on the allow-list");
            return Ok(());
        }

        let code = self.rng.random_range(0..LOGIN_CODE_RANGE);
        self.ctx
            .store
            .apply(Batch::new().sadd(keys::LOGIN_REQUESTS, format!("{email},{code}")))
            .await?;

        let audience = match p.role {
            Role::SponsorRep => "sponsor",
            Role::Organizer => "organizer",
            _ => "mentor",
        };
        let mailer = self.ctx.services.mailer.clone();
        tokio::spawn(async move {
            if let Err(e) = mailer.send_login_code(&email, code, audience).await {
                tracing::warn!(error = %e, "Failed to send login code");
            }
        });
        Ok(())
    }

    /// `add_email`: put an address on a role allow-list.
    pub(super) async fn add_email(&mut self, p: AddEmailPacket) -> Result<(), CoreError> {
        let Some(list) = p.role.allow_list_key() else {
            return Ok(());
        };
        let email = normalize_email(&p.email);
        let mut batch = Batch::new().sadd(list, email.as_str());
        if p.role == Role::SponsorRep {
            batch = batch.hset_one(keys::EMAIL_TO_SPONSOR, email.as_str(), p.sponsor_id);
        }
        self.ctx.store.apply(batch).await?;
        Ok(())
    }

    /// `register`: fill in the profile and reply a fresh `init`.
    pub(super) async fn register_profile(
        &mut self,
        sender: ConnectionId,
        me: &Character,
        p: RegisterPacket,
    ) -> Result<(), CoreError> {
        let store = self.ctx.store.clone();
        let mut fields = Vec::new();

        if !p.name.is_empty() {
            let name = match me.role {
                Role::Organizer => format!("{} ({ORGANIZER_SUFFIX})", p.name),
                Role::SponsorRep => {
                    let sponsor = store
                        .hget(&keys::sponsor(&me.sponsor_id), "name")
                        .await?
                        .unwrap_or_default();
                    format!("{} ({sponsor})", p.name)
                }
                _ => p.name,
            };
            fields.push(field("name", name));
        }
        if !p.location.is_empty() {
            fields.push(field("location", p.location));
        }
        if !p.bio.is_empty() {
            fields.push(field("bio", p.bio));
        }

        let mut batch = Batch::new().hset(keys::character(&me.id), fields);
        if !p.phone_number.is_empty() {
            batch = batch.hset_one(keys::settings(&me.id), "phoneNumber", p.phone_number);
        }
        store.apply(batch).await?;

        if let Some(fresh) = load_character(store.as_ref(), &me.id).await? {
            self.update_character(sender, |c| *c = fresh);
        }

        let init = world::init_packet(store.as_ref(), &self.ctx.secrets.jwt_secret, &me.id, &me.room, true).await?;
        self.send_to(sender, &Packet::Init(init));
        Ok(())
    }

    /// `settings`: replace the sender's preferences and echo them back.
    pub(super) async fn update_settings(
        &mut self,
        sender: ConnectionId,
        me: &Character,
        p: SettingsPacket,
    ) -> Result<(), CoreError> {
        self.ctx
            .store
            .apply(Batch::new().hset(keys::settings(&me.id), p.settings.to_fields()))
            .await?;
        self.send_to(sender, &Packet::Settings(p));
        Ok(())
    }

    /// `status`: focus change, announced to friends and teammates.
    pub(super) async fn status(&mut self, me: &Character, p: StatusPacket) -> Result<(), CoreError> {
        let store = self.ctx.store.clone();
        let active = if p.active { "true" } else { "false" };
        store
            .apply(Batch::new().set(keys::character_active(&me.id), active))
            .await?;

        let (friend_ids, teammate_ids) = status_recipients(store.as_ref(), &me.id).await?;
        self.broadcast(Packet::Status(StatusPacket {
            id: me.id.clone(),
            active: p.active,
            online: true,
            friend_ids,
            teammate_ids,
        }))
        .await
    }

    /// Remove a connection. Bound connections go through the disconnect
    /// procedure first: the character leaves its room and goes offline.
    ///
    /// Store failures are logged; the connection is removed regardless.
    pub(super) async fn disconnect(&mut self, id: ConnectionId) {
        let Some(conn) = self.connections.remove(&id) else {
            return;
        };
        tracing::debug!(connection = %id, "Connection unregistered");

        let Some(character) = conn.character else {
            return;
        };
        if let Err(e) = self.leave_world(&character).await {
            tracing::warn!(character = %character.id, error = %e, "Disconnect procedure failed");
        }
    }

    async fn leave_world(&mut self, character: &Character) -> Result<(), CoreError> {
        let store = self.ctx.store.clone();
        let id = character.id.as_str();

        let room = store
            .hget(&keys::character(id), "room")
            .await?
            .unwrap_or_else(|| character.room.clone());

        store
            .apply(
                Batch::new()
                    .del(keys::character_active(id))
                    .hdel(keys::character(id), "ingest")
                    .srem(keys::ingest_characters(self.ctx.ingest.as_str()), id)
                    .srem(keys::room_characters(&room), id),
            )
            .await?;

        let (friend_ids, teammate_ids) = status_recipients(store.as_ref(), id).await?;

        self.broadcast(Packet::Leave(LeavePacket {
            character: character.public(),
            room,
        }))
        .await?;
        self.broadcast(Packet::Status(StatusPacket {
            id: id.to_owned(),
            active: false,
            online: false,
            friend_ids,
            teammate_ids,
        }))
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emails_are_trimmed_and_lowercased() {
        assert_eq!(normalize_email("  Kay@Example.COM "), "kay@example.com");
    }
}
