//! Directory session: one connection, one bound user, one batch at a time.

use tracing::{debug, info, instrument, warn};

use crate::attributes::AttributeMap;
use crate::auth::{BindDiagnostic, BindFailure, BindOutcome, Credentials, RESULT_INVALID_CREDENTIALS};
use crate::client::DirectoryClient;
use crate::config::DirectoryConfig;
use crate::error::{DirectoryError, DirectoryResult};
use crate::filter::FilterBuilder;
use crate::record::ResultSet;
use crate::runner::PagedSearchRunner;
use crate::types::ProtocolVersion;

/// A directory client together with its connection state.
#[derive(Debug)]
pub struct Connection<C> {
    client: C,
    /// Negotiated protocol version; `None` while closed.
    protocol: Option<ProtocolVersion>,
    bound_user: Option<String>,
}

impl<C> Connection<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            protocol: None,
            bound_user: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.protocol.is_some()
    }

    pub fn is_bound(&self) -> bool {
        self.bound_user.is_some()
    }

    pub fn protocol(&self) -> Option<ProtocolVersion> {
        self.protocol
    }

    pub fn bound_user(&self) -> Option<&str> {
        self.bound_user.as_deref()
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn client_mut(&mut self) -> &mut C {
        &mut self.client
    }

    pub(crate) fn mark_open(&mut self, protocol: ProtocolVersion) {
        self.protocol = Some(protocol);
        self.bound_user = None;
    }

    pub(crate) fn mark_bound(&mut self, user: impl Into<String>) {
        self.bound_user = Some(user.into());
    }

    pub(crate) fn reset(&mut self) {
        self.protocol = None;
        self.bound_user = None;
    }
}

/// Drives connect, bind and lookup batches over one [`DirectoryClient`].
#[derive(Debug)]
pub struct DirectorySession<C> {
    config: DirectoryConfig,
    connection: Connection<C>,
    runner: PagedSearchRunner,
}

impl<C: DirectoryClient> DirectorySession<C> {
    /// Create a session. Nothing is connected until [`Self::connect`].
    ///
    /// # Errors
    /// [`DirectoryError::InvalidConfiguration`] if `config` does not validate.
    pub fn new(config: DirectoryConfig, client: C) -> DirectoryResult<Self> {
        config.validate()?;
        let runner = PagedSearchRunner::from_config(&config);
        Ok(Self {
            config,
            connection: Connection::new(client),
            runner,
        })
    }

    pub fn config(&self) -> &DirectoryConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_open()
    }

    pub fn is_bound(&self) -> bool {
        self.connection.is_bound()
    }

    pub fn bound_user(&self) -> Option<&str> {
        self.connection.bound_user()
    }

    pub fn protocol(&self) -> Option<ProtocolVersion> {
        self.connection.protocol()
    }

    pub fn client(&self) -> &C {
        self.connection.client()
    }

    /// Connect, negotiate the protocol version and bind.
    ///
    /// A bind is only attempted when both user name and password are given.
    /// An open connection is closed first.
    ///
    /// # Errors
    /// [`DirectoryError::Unreachable`] if the server cannot be reached,
    /// [`DirectoryError::NoValidProtocol`] if no protocol version is accepted.
    #[instrument(skip(self, credentials), fields(host = %self.config.normalized_host(), user = %credentials.username))]
    pub async fn connect(&mut self, credentials: &Credentials) -> DirectoryResult<BindOutcome> {
        if self.connection.is_open() {
            self.close().await?;
        }

        let endpoint = self.config.endpoint();
        self.connection.client_mut().connect(&endpoint).await?;

        let negotiated = self
            .connection
            .client_mut()
            .negotiate_protocol_version(self.config.protocol_version, &endpoint.host);
        let protocol = match negotiated {
            Ok(protocol) => protocol,
            Err(e) => {
                if let Err(close_err) = self.connection.client_mut().close().await {
                    debug!(error = %close_err, "Close after failed negotiation failed");
                }
                return Err(e);
            }
        };
        self.connection.mark_open(protocol);

        if !credentials.is_complete() {
            debug!(protocol = %protocol, "Connected without bind");
            return Ok(BindOutcome::Unbound);
        }

        let bind_name = self.bind_name(credentials);
        let accepted = self
            .connection
            .client_mut()
            .bind(&bind_name, &credentials.password)
            .await?;

        if accepted {
            self.connection.mark_bound(credentials.username.clone());
            info!(protocol = %protocol, bind_name = %bind_name, "Bound to directory");
            return Ok(BindOutcome::Bound);
        }

        let diagnostic = self
            .connection
            .client()
            .last_diagnostic()
            .unwrap_or_else(|| BindDiagnostic::new(RESULT_INVALID_CREDENTIALS, ""));
        let failure = diagnostic.classify();
        info!(
            bind_name = %bind_name,
            reason = %failure,
            result_code = diagnostic.result_code,
            "Bind rejected"
        );
        Ok(BindOutcome::Rejected(failure))
    }

    fn bind_name(&self, credentials: &Credentials) -> String {
        match (&credentials.domain, &self.config.domain) {
            (None, Some(domain)) => credentials.clone().with_domain(domain.clone()).bind_name(),
            _ => credentials.bind_name(),
        }
    }

    /// Check credentials.
    ///
    /// Without an open connection this connects, binds and closes again. An
    /// unreachable server is reported as [`BindFailure::TargetUnreachable`].
    /// On an open connection the current state is returned.
    ///
    /// # Errors
    /// [`DirectoryError::AlreadyBound`] when the open connection is bound to a
    /// different user.
    pub async fn authenticate(&mut self, credentials: &Credentials) -> DirectoryResult<BindOutcome> {
        if self.connection.is_open() {
            return match self.connection.bound_user() {
                Some(user) if user != credentials.username => Err(DirectoryError::AlreadyBound {
                    requested: credentials.username.clone(),
                }),
                Some(_) => Ok(BindOutcome::Bound),
                None => Ok(BindOutcome::Unbound),
            };
        }

        let outcome = match self.connect(credentials).await {
            Ok(outcome) => outcome,
            Err(DirectoryError::Unreachable { host, port, .. }) => {
                warn!(host = %host, port, "Directory unreachable during authentication");
                BindOutcome::Rejected(BindFailure::TargetUnreachable)
            }
            Err(e) => {
                if let Err(close_err) = self.close().await {
                    debug!(error = %close_err, "Close after failed authentication failed");
                }
                return Err(e);
            }
        };
        self.close().await?;
        Ok(outcome)
    }

    /// Run a lookup batch.
    ///
    /// Every compiled filter is searched in order and each record is
    /// correlated as it arrives. A failed search under one base location is
    /// logged and its elements end up as negative results; transport errors
    /// abort the batch. On an unbound session no search is issued.
    #[instrument(skip(self, builder, attributes), fields(base = %builder.base_location()))]
    pub async fn query(
        &mut self,
        mut builder: FilterBuilder,
        attributes: Option<&AttributeMap>,
    ) -> DirectoryResult<ResultSet> {
        let filters = builder.compile_filters();
        builder.build_reverse_index(attributes);

        if !self.connection.is_bound() {
            debug!(filters = filters.len(), "Session not bound, no searches issued");
        }

        for filter in &filters {
            let location = filter.base_location.as_str();
            let outcome = self
                .runner
                .run(
                    &mut self.connection,
                    location,
                    &filter.expression,
                    attributes,
                    |record| builder.correlate(record, location),
                )
                .await;

            match outcome {
                Ok(records) => debug!(location = %location, records, "Location searched"),
                Err(e) if e.is_location_scoped() => {
                    warn!(
                        location = %location,
                        filter = %filter.expression,
                        error = %e,
                        "Search failed, continuing with remaining locations"
                    );
                }
                Err(e) => return Err(e),
            }
        }

        Ok(builder.into_result())
    }

    /// Close the connection and reset to unbound. Closing a closed session
    /// is a no-op.
    pub async fn close(&mut self) -> DirectoryResult<()> {
        if !self.connection.is_open() {
            return Ok(());
        }
        let result = self.connection.client_mut().close().await;
        self.connection.reset();
        debug!("Directory connection closed");
        result
    }
}
