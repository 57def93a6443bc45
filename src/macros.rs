macro_rules! bug {
    ($msg:expr) => ({
        bug!("{}", $msg)
    });
    ($fmt:expr, $($arg:tt)+) => ({
        error!(
            concat!("bug in stencil: ",
                    $fmt,
                    ". Please open an issue with the template and data \
                    that triggered this."),
            $($arg)*
        )
    });
}
