use core::fmt;
use std::time::Duration;

use log::{debug, info, warn};
use thiserror::Error;

use crate::{
    auth::{ChallengeFields, Credentials, DigestChallenge, DigestInputs, NONCE_COUNT},
    message::{
        parse_response, Header, Method, Request, SmallString, MAX_DATAGRAM_LEN, MAX_RESPONSE_LEN,
    },
    random::{self, RandomSource, ThreadRandom},
    transport::{Transport, TransportError, UdpTransport},
    SipError,
};

pub const DEFAULT_PORT: u16 = 5160;
pub const DEFAULT_LOCAL_ADDR: &str = "127.0.0.1:5160";
pub const DEFAULT_DISPLAY_NAME: &str = "Test Client";
pub const DEFAULT_USER_AGENT: &str = "sip-register";
pub const DEFAULT_EXPIRES: u32 = 3600;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
pub const MAX_FORWARDS: u32 = 70;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterConfig {
    /// Registrar host or domain, without port.
    pub server: String,
    pub port: u16,
    pub credentials: Credentials,
    /// `host:port` advertised in Via and Contact.
    pub local_addr: String,
    pub user_agent: String,
    pub expires: u32,
    /// Applied to each receive separately.
    pub timeout: Duration,
}

impl RegisterConfig {
    pub fn new(server: &str, username: &str, password: &str) -> Self {
        Self {
            server: server.to_string(),
            port: DEFAULT_PORT,
            credentials: Credentials {
                username: username.to_string(),
                password: password.to_string(),
                display_name: DEFAULT_DISPLAY_NAME.to_string(),
            },
            local_addr: DEFAULT_LOCAL_ADDR.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            expires: DEFAULT_EXPIRES,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_display_name(mut self, display_name: &str) -> Self {
        self.credentials.display_name = display_name.to_string();
        self
    }

    pub fn with_local_addr(mut self, local_addr: &str) -> Self {
        self.local_addr = local_addr.to_string();
        self
    }

    pub fn with_user_agent(mut self, user_agent: &str) -> Self {
        self.user_agent = user_agent.to_string();
        self
    }

    pub fn with_expires(mut self, expires: u32) -> Self {
        self.expires = expires;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Request-URI, and the digest URI.
    pub fn registrar_uri(&self) -> String {
        format!("sip:{}", self.server)
    }

    fn local_host(&self) -> &str {
        self.local_addr
            .rsplit_once(':')
            .map_or(self.local_addr.as_str(), |(host, _)| host)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegistrationState {
    #[default]
    Initial,
    AwaitingFirstResponse,
    Unchallenged,
    Challenged,
    AwaitingSecondResponse,
    Success,
    Failed,
}

/// Identifiers shared by both REGISTER attempts of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogContext {
    pub call_id: String,
    pub from_tag: String,
    pub cseq: u32,
}

impl DialogContext {
    pub fn new<R: RandomSource + ?Sized>(rng: &mut R, host: &str) -> Self {
        Self {
            call_id: random::call_id(rng, host),
            from_tag: random::tag(rng),
            cseq: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Round {
    Initial,
    Authenticated,
}

impl fmt::Display for Round {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Round::Initial => write!(f, "initial"),
            Round::Authenticated => write!(f, "authenticated"),
        }
    }
}

/// Successful outcome of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registered {
    /// The registrar accepted us only after a digest challenge.
    pub authenticated: bool,
    /// Raw text of the final 200 OK.
    pub response: String,
}

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("no response to the {round} REGISTER")]
    NoResponse { round: Round },
    #[error("challenge is missing realm or nonce")]
    MissingChallengeParameters {
        response: String,
        challenge: ChallengeFields,
    },
    #[error("unexpected response to the initial REGISTER")]
    UnexpectedResponse { response: String },
    #[error("registrar rejected the credentials")]
    AuthenticationFailed {
        response: String,
        challenge: DigestChallenge,
    },
    #[error("transport error: {0}")]
    Transport(TransportError),
    #[error("could not build REGISTER: {0}")]
    Message(#[from] SipError),
}

impl RegistrationError {
    /// Raw text of the response that ended the session, if there was one.
    pub fn response(&self) -> Option<&str> {
        match self {
            RegistrationError::MissingChallengeParameters { response, .. }
            | RegistrationError::UnexpectedResponse { response }
            | RegistrationError::AuthenticationFailed { response, .. } => Some(response),
            _ => None,
        }
    }
}

/// Build a REGISTER for the given dialog. The Authorization header, when
/// present, goes between Contact and Max-Forwards.
pub fn build_register(
    config: &RegisterConfig,
    dialog: &DialogContext,
    branch: &str,
    authorization: Option<Header>,
) -> crate::Result<Request> {
    let creds = &config.credentials;
    let aor = format!(
        "\"{}\" <sip:{}@{}>",
        creds.display_name, creds.username, config.server
    );

    let mut req = Request::new(Method::Register, &config.registrar_uri())?;
    req.add_header(Header::new(
        "Via",
        &format!("SIP/2.0/UDP {};branch={}", config.local_addr, branch),
    ))?;
    req.add_header(Header::new("From", &format!("{aor};tag={}", dialog.from_tag)))?;
    req.add_header(Header::new("To", &aor))?;
    req.add_header(Header::new("Call-ID", &dialog.call_id))?;
    req.add_header(Header::new("CSeq", &format!("{} {}", dialog.cseq, Method::Register)))?;
    req.add_header(Header::new(
        "Contact",
        &format!("<sip:{}@{}>", creds.username, config.local_addr),
    ))?;
    if let Some(auth) = authorization {
        req.add_header(auth)?;
    }
    req.add_header(Header::new("Max-Forwards", &MAX_FORWARDS.to_string()))?;
    req.add_header(Header::new("Expires", &config.expires.to_string()))?;
    req.add_header(Header::new("User-Agent", &config.user_agent))?;
    req.add_header(Header::new("Content-Length", "0"))?;

    Ok(req)
}

/// One unauthenticated REGISTER, and at most one authenticated retry.
#[derive(Debug)]
pub struct RegistrationSession<T, R> {
    config: RegisterConfig,
    transport: T,
    rng: R,
    dialog: DialogContext,
    state: RegistrationState,
}

impl<T: Transport, R: RandomSource> RegistrationSession<T, R> {
    pub fn new(config: RegisterConfig, transport: T, mut rng: R) -> Self {
        let dialog = DialogContext::new(&mut rng, config.local_host());
        Self {
            config,
            transport,
            rng,
            dialog,
            state: RegistrationState::Initial,
        }
    }

    pub fn state(&self) -> RegistrationState {
        self.state
    }

    pub fn dialog(&self) -> &DialogContext {
        &self.dialog
    }

    /// Drive the exchange to a terminal state.
    pub fn run(&mut self) -> Result<Registered, RegistrationError> {
        let result = self.exchange();
        match &result {
            Ok(registered) => {
                self.state = RegistrationState::Success;
                info!(
                    "registered {} at {} (authenticated: {})",
                    self.config.credentials.username, self.config.server, registered.authenticated
                );
            }
            Err(err) => {
                self.state = RegistrationState::Failed;
                debug!("registration session failed: {err}");
            }
        }
        result
    }

    fn exchange(&mut self) -> Result<Registered, RegistrationError> {
        let first = self.render_register(None)?;
        self.transition(RegistrationState::AwaitingFirstResponse);
        let response = self.round_trip(&first, Round::Initial)?;

        let parsed = parse_response(&response);
        if !parsed.is_challenge() {
            self.transition(RegistrationState::Unchallenged);
            return if parsed.is_success() {
                Ok(Registered {
                    authenticated: false,
                    response,
                })
            } else {
                Err(RegistrationError::UnexpectedResponse { response })
            };
        }

        self.transition(RegistrationState::Challenged);
        let fields = ChallengeFields::from_response(&parsed);
        debug!("challenge fields: {fields:?}");
        let Some(challenge) = fields.clone().into_challenge() else {
            return Err(RegistrationError::MissingChallengeParameters {
                response,
                challenge: fields,
            });
        };

        let authorization = self.authorize(&challenge);
        self.dialog.cseq += 1;
        let second = self.render_register(Some(authorization))?;
        self.transition(RegistrationState::AwaitingSecondResponse);
        let response = self.round_trip(&second, Round::Authenticated)?;

        if parse_response(&response).is_success() {
            Ok(Registered {
                authenticated: true,
                response,
            })
        } else {
            Err(RegistrationError::AuthenticationFailed {
                response,
                challenge,
            })
        }
    }

    fn authorize(&mut self, challenge: &DigestChallenge) -> Header {
        let cnonce = match challenge.qop {
            Some(_) => random::cnonce(&mut self.rng),
            None => String::new(),
        };
        let uri = self.config.registrar_uri();
        let inputs = DigestInputs {
            credentials: &self.config.credentials,
            challenge,
            method: "REGISTER",
            uri: &uri,
            nc: NONCE_COUNT,
            cnonce: &cnonce,
        };
        crate::auth::authorization_header(&inputs)
    }

    fn render_register(
        &mut self,
        authorization: Option<Header>,
    ) -> Result<SmallString<MAX_DATAGRAM_LEN>, RegistrationError> {
        let branch = random::branch(&mut self.rng);
        let req = build_register(&self.config, &self.dialog, &branch, authorization)?;
        Ok(req.render()?)
    }

    fn round_trip(&mut self, request: &str, round: Round) -> Result<String, RegistrationError> {
        debug!("sending {round} REGISTER:\n{request}");
        self.transport
            .send_to(request.as_bytes(), &self.config.server, self.config.port)
            .map_err(RegistrationError::Transport)?;

        match self.transport.recv_from(MAX_RESPONSE_LEN) {
            Ok(bytes) => {
                let text = String::from_utf8_lossy(&bytes).into_owned();
                debug!("received response to {round} REGISTER:\n{text}");
                match parse_response(&text).status_code() {
                    Some(code) => info!("{round} REGISTER answered with {code}"),
                    None => warn!("{round} REGISTER answered without a SIP status line"),
                }
                Ok(text)
            }
            Err(TransportError::Timeout) => Err(RegistrationError::NoResponse { round }),
            Err(e) => Err(RegistrationError::Transport(e)),
        }
    }

    fn transition(&mut self, state: RegistrationState) {
        debug!("registration state {:?} -> {:?}", self.state, state);
        self.state = state;
    }
}

/// Run one session over a fresh UDP socket, closed again before returning.
pub fn register(config: RegisterConfig) -> Result<Registered, RegistrationError> {
    let transport = UdpTransport::bind(config.timeout).map_err(RegistrationError::Transport)?;
    RegistrationSession::new(config, transport, ThreadRandom).run()
}
