quick_error! {
    #[derive(Debug)]
    pub enum ProtocolError {
        ConnectionClosed {
            display("connection closed before the reply was complete")
        }
        MalformedKey(key: String) {
            display("malformed key {:?}: key is too long or contains invalid characters", key)
        }
        UnexpectedResponse(response: String) {
            display("unexpected response: {}", response)
        }
        ServerError(message: String) {
            display("server error: {}", message)
        }
        MalformedFrame(reason: &'static str) {
            display("malformed datagram: {}", reason)
        }
        Utf8Error(err: std::str::Utf8Error) {
            from()
            display("invalid utf-8 in response: {}", err)
        }
        ParseError(err: std::num::ParseIntError) {
            from()
            display("invalid number in response: {}", err)
        }
        IOError(err: std::io::Error) {
            from()
            display("{}", err)
            cause(err)
        }
    }
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
