/// Capture the [`CallSite`](crate::record::CallSite) of the macro invocation:
/// file, enclosing function, line and module path.
#[macro_export]
macro_rules! callsite {
    () => {{
        fn __callsite() {}
        fn __type_name_of<T>(_: T) -> &'static str {
            ::std::any::type_name::<T>()
        }
        $crate::record::CallSite::new(
            file!(),
            __type_name_of(__callsite),
            line!(),
            module_path!(),
        )
    }};
}

#[doc(hidden)]
#[macro_export]
macro_rules! __domain_event {
    ($logger:expr, $severity:expr, $event:expr $(, $key:ident = $value:expr)*) => {{
        let logger = &$logger;
        if logger.is_enabled_for($severity) {
            let event = $crate::record::DomainEvent::new($event)
                .at($crate::callsite!())
                $(.field(stringify!($key), $value))*;
            logger.log_domain($severity, event);
        }
    }};
}

/// Emit a domain record at `INFO`.
///
/// ```no_run
/// # let logger = structured_audit_log::init::init_logging(Default::default());
/// structured_audit_log::domain_info!(logger, "product_created", request_id = "r1", product_id = "p1");
/// ```
///
/// Fields are only built when the level is enabled.
#[macro_export]
macro_rules! domain_info {
    ($logger:expr, $event:expr $(, $key:ident = $value:expr)* $(,)?) => {
        $crate::__domain_event!($logger, $crate::severity::Severity::Info, $event $(, $key = $value)*)
    };
}

#[macro_export]
macro_rules! domain_debug {
    ($logger:expr, $event:expr $(, $key:ident = $value:expr)* $(,)?) => {
        $crate::__domain_event!($logger, $crate::severity::Severity::Debug, $event $(, $key = $value)*)
    };
}

#[macro_export]
macro_rules! domain_warning {
    ($logger:expr, $event:expr $(, $key:ident = $value:expr)* $(,)?) => {
        $crate::__domain_event!($logger, $crate::severity::Severity::Warning, $event $(, $key = $value)*)
    };
}

#[macro_export]
macro_rules! domain_error {
    ($logger:expr, $event:expr $(, $key:ident = $value:expr)* $(,)?) => {
        $crate::__domain_event!($logger, $crate::severity::Severity::Error, $event $(, $key = $value)*)
    };
}

/// Emit an audit record. The six HTTP fields are mandatory and must be
/// given in this order; any further `key = value` pairs follow.
///
/// ```no_run
/// # let logger = structured_audit_log::init::init_logging(Default::default());
/// structured_audit_log::audit!(
///     logger,
///     "http_request",
///     base_url = "http://x",
///     client = "curl",
///     client_ip_address = "127.0.0.1",
///     http_method = "GET",
///     path = "/health",
///     status_code = 200,
///     request_id = "abc-123",
/// );
/// ```
#[macro_export]
macro_rules! audit {
    (
        $logger:expr,
        $event:expr,
        base_url = $base_url:expr,
        client = $client:expr,
        client_ip_address = $client_ip_address:expr,
        http_method = $http_method:expr,
        path = $path:expr,
        status_code = $status_code:expr
        $(, $key:ident = $value:expr)* $(,)?
    ) => {{
        let logger = &$logger;
        if logger.is_enabled_for($crate::severity::Severity::Audit) {
            let event = $crate::record::AuditEvent::new(
                $event,
                $crate::record::AuditFields {
                    base_url: ::std::string::ToString::to_string(&$base_url),
                    client: ::std::string::ToString::to_string(&$client),
                    client_ip_address: ::std::string::ToString::to_string(&$client_ip_address),
                    http_method: ::std::string::ToString::to_string(&$http_method),
                    path: ::std::string::ToString::to_string(&$path),
                    status_code: $status_code,
                },
            )
            .at($crate::callsite!())
            $(.field(stringify!($key), $value))*;
            logger.audit(event);
        }
    }};
}
