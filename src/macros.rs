#[macro_export]
macro_rules! debugln {
    ($($rest:tt)*) => {
        log::debug!($($rest)*)
    };
}

#[macro_export]
macro_rules! infoln {
    ($($rest:tt)*) => {
        log::info!($($rest)*)
    };
}

#[macro_export]
macro_rules! warnln {
    ($($rest:tt)*) => {
        log::warn!($($rest)*)
    };
}
