quick_error! {
    #[derive(Debug)]
    pub enum SelectorError {
        NoServers {
            display("no servers configured or available")
        }
        AddressResolution(server: String, err: std::io::Error) {
            display("cannot resolve server address {:?}: {}", server, err)
            cause(err)
        }
    }
}

pub type Result<T> = std::result::Result<T, SelectorError>;
