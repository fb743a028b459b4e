//! Account mutations over REST.
//!
//! A session with a proxy sends its requests through the relay. When the
//! relay is missing or fails, the request goes out directly and the session
//! log says so, since that exposes the local network identity.

use crate::event::{Reporter, SessionUpdate};
use crate::rest::{RestError, RestResponse};
use crate::session::Session;
use beacon_core::{AccountProfile, HypeSquadHouse, LogEntry, ProfilePatch, RestRequest};

/// Result of a profile or HypeSquad change.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationOutcome {
    pub success: bool,
    pub message: String,
    /// Fresh profile snapshot, when the API returned one.
    pub profile: Option<AccountProfile>,
}

impl MutationOutcome {
    fn success(message: impl Into<String>, profile: Option<AccountProfile>) -> Self {
        Self {
            success: true,
            message: message.into(),
            profile,
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            profile: None,
        }
    }
}

fn current_user(api_base: &str, token: &str) -> RestRequest {
    RestRequest::new("GET", format!("{api_base}/users/@me")).header("Authorization", token)
}

fn profile_request(
    api_base: &str,
    token: &str,
    patch: &ProfilePatch,
) -> Result<RestRequest, serde_json::Error> {
    let body = serde_json::to_value(patch)?;
    Ok(RestRequest::new("PATCH", format!("{api_base}/users/@me"))
        .header("Authorization", token)
        .json(body))
}

fn house_request(api_base: &str, token: &str, house: HypeSquadHouse) -> RestRequest {
    RestRequest::new("POST", format!("{api_base}/hypesquad/online"))
        .header("Authorization", token)
        .json(serde_json::json!({ "house_id": house.id() }))
}

impl Session {
    /// Change display name, bio, accent color, or pronouns.
    pub async fn update_profile(&self, patch: ProfilePatch) -> MutationOutcome {
        let patch = patch.capped();
        if patch.is_empty() {
            return MutationOutcome::failure("Nothing to update");
        }

        let reporter = self.reporter();
        let settings = self.engine.settings();
        let request = match profile_request(&settings.api_base, self.config.token.expose(), &patch) {
            Ok(request) => request,
            Err(e) => {
                let outcome = MutationOutcome::failure(format!("Profile update failed: {e}"));
                report(&reporter, &outcome);
                return outcome;
            }
        };

        let outcome = match self.dispatch(request, &reporter).await {
            Ok(response) if response.is_success() => {
                let profile = serde_json::from_value::<AccountProfile>(response.body).ok();
                MutationOutcome::success("Profile updated", profile)
            }
            Ok(response) => MutationOutcome::failure(format!(
                "Profile update failed: {}",
                response.error_message()
            )),
            Err(e) => MutationOutcome::failure(format!("Profile update failed: {e}")),
        };
        report(&reporter, &outcome);
        outcome
    }

    /// Join a HypeSquad house, then refresh the profile snapshot.
    pub async fn change_house(&self, house: HypeSquadHouse) -> MutationOutcome {
        let reporter = self.reporter();
        let settings = self.engine.settings();
        let token = self.config.token.expose();

        let outcome = match self
            .dispatch(house_request(&settings.api_base, token, house), &reporter)
            .await
        {
            Ok(response) if response.is_success() => {
                let profile = match self
                    .dispatch(current_user(&settings.api_base, token), &reporter)
                    .await
                {
                    Ok(response) if response.is_success() => {
                        serde_json::from_value::<AccountProfile>(response.body).ok()
                    }
                    Ok(response) => {
                        tracing::debug!("Profile refresh failed: {}", response.error_message());
                        None
                    }
                    Err(e) => {
                        tracing::debug!("Profile refresh failed: {}", e);
                        None
                    }
                };
                MutationOutcome::success(format!("HypeSquad house set to {house}"), profile)
            }
            Ok(response) => MutationOutcome::failure(format!(
                "HypeSquad change failed: {}",
                response.error_message()
            )),
            Err(e) => MutationOutcome::failure(format!("HypeSquad change failed: {e}")),
        };
        report(&reporter, &outcome);
        outcome
    }

    async fn dispatch(
        &self,
        request: RestRequest,
        reporter: &Reporter,
    ) -> Result<RestResponse, RestError> {
        if let Some(proxy) = &self.config.proxy {
            if self.engine.relay.address().is_some() {
                match self.engine.relay.forward(request.clone(), proxy).await {
                    Ok(data) => return Ok(RestResponse::from_relay(data)),
                    Err(e) => {
                        reporter.log(LogEntry::error(format!(
                            "Relay unavailable ({e}); sending {} {} directly from the local network identity",
                            request.method, request.endpoint
                        )));
                    }
                }
            } else {
                reporter.log(LogEntry::error(format!(
                    "Proxy [{}] selected but no relay address is configured; \
                     sending {} {} directly",
                    proxy.display_name(),
                    request.method,
                    request.endpoint
                )));
            }
        }

        let timeout = self.engine.settings.request_timeout;
        tokio::time::timeout(timeout, self.engine.rest.execute(&request))
            .await
            .map_err(|_| RestError::Timeout(timeout))?
    }
}

fn report(reporter: &Reporter, outcome: &MutationOutcome) {
    if outcome.success {
        reporter.log(LogEntry::success(outcome.message.clone()));
        if let Some(profile) = &outcome.profile {
            reporter.update(SessionUpdate::Profile(profile.clone()));
        }
    } else {
        reporter.log(LogEntry::error(outcome.message.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_request_shape() {
        let patch = ProfilePatch::default().bio("hello").accent_color(0x12345678);
        let request = profile_request("https://api", "tok", &patch).unwrap();
        assert_eq!(request.method, "PATCH");
        assert_eq!(request.endpoint, "https://api/users/@me");
        assert_eq!(request.headers["Authorization"], "tok");
        let body = request.body.unwrap();
        assert_eq!(body["bio"], "hello");
        assert_eq!(body["accent_color"], 0x345678);
        assert!(body.get("pronouns").is_none());
    }

    #[test]
    fn house_request_shape() {
        let request = house_request("https://api", "tok", HypeSquadHouse::Brilliance);
        assert_eq!(request.method, "POST");
        assert_eq!(request.endpoint, "https://api/hypesquad/online");
        assert_eq!(request.body.unwrap()["house_id"], 2);
    }
}
