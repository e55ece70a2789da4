mod test_reply;
mod test_server;
