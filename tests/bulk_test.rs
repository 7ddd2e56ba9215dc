#[cfg(test)]
mod tests {
    extern crate sbmp_rs as sbmp;
    use sbmp::{BulkRx, BulkTx, Endpoint, EndpointConfig, Error, Interface};
    use std::cell::RefCell;

    const OFFER_TYPE: u8 = 20;

    struct Uart {
        wire: RefCell<Vec<u8>>,
    }

    impl Uart {
        fn new() -> Self {
            Uart {
                wire: RefCell::new(Vec::new()),
            }
        }

        fn take(&self) -> Vec<u8> {
            self.wire.borrow_mut().split_off(0)
        }
    }

    impl Interface for Uart {
        fn tx_byte(&self, byte: u8) -> bool {
            self.wire.borrow_mut().push(byte);
            true
        }
    }

    struct App {
        transfer: RefCell<Option<BulkRx>>,
        chunks: RefCell<usize>,
    }

    impl App {
        fn new() -> Self {
            App {
                transfer: RefCell::new(None),
                chunks: RefCell::new(0),
            }
        }
    }

    fn offer_handler(app: &App, _rsp: &mut sbmp::Responder<Uart>, dg: &sbmp::Datagram) {
        if dg.dg_type == OFFER_TYPE {
            let rx = BulkRx::begin(dg).unwrap();
            *app.transfer.borrow_mut() = Some(rx);
        }
    }

    fn chunk_listener(app: &App, _rsp: &mut sbmp::Responder<Uart>, dg: &sbmp::Datagram) {
        *app.chunks.borrow_mut() += 1;
        if let Some(rx) = app.transfer.borrow_mut().as_mut() {
            rx.receive(dg);
        }
    }

    fn pump(from: &Uart, to: &mut Endpoint<Uart, App>) {
        let bytes = from.take();
        to.poll(&bytes);
    }

    #[test]
    fn transfer_reassembles_through_listener() {
        let uart_a = Uart::new();
        let uart_b = Uart::new();
        let app_a = App::new();
        let app_b = App::new();
        let mut e1 = Endpoint::new(
            String::from("e1"),
            &uart_a,
            &app_a,
            EndpointConfig::default(),
            offer_handler,
        );
        let mut e2 = Endpoint::new(
            String::from("e2"),
            &uart_b,
            &app_b,
            EndpointConfig::default().with_buffer_size(16),
            offer_handler,
        );

        e1.start_handshake().unwrap();
        pump(&uart_a, &mut e2);
        pump(&uart_b, &mut e1);
        // chunks are bounded by the peer's 16 B buffer: 13 B of payload each
        assert_eq!(13, e1.max_payload());

        let data: Vec<u8> = (0..100).map(|i| i as u8).collect();

        let mut tx = BulkTx::offer(&mut e1, OFFER_TYPE, &data).unwrap();
        pump(&uart_a, &mut e2);
        {
            let transfer = app_b.transfer.borrow();
            let rx = transfer.as_ref().unwrap();
            assert_eq!(100, rx.total());
            assert_eq!(tx.session(), rx.session());
            assert!(!rx.is_complete());
        }
        e2.add_listener(tx.session(), chunk_listener).unwrap();

        let mut rounds = 0;
        loop {
            let done = tx.send_chunk(&mut e1).unwrap();
            pump(&uart_a, &mut e2);
            rounds += 1;
            if done {
                break;
            }
        }

        // 7 full 13 B chunks and a 9 B tail
        assert_eq!(8, rounds);
        assert_eq!(8, *app_b.chunks.borrow());
        assert_eq!(0, tx.remaining());

        let transfer = app_b.transfer.borrow_mut().take().unwrap();
        assert!(transfer.is_complete());
        assert_eq!(data, transfer.into_data());
    }

    #[test]
    fn begin_refuses_short_header() {
        let dg = sbmp::Datagram {
            session: 0x0001,
            dg_type: OFFER_TYPE,
            payload: &[0x10, 0x00],
        };
        assert_eq!(Some(Error::BadBulkHeader), BulkRx::begin(&dg).err());
    }

    #[test]
    fn receive_ignores_other_sessions_and_caps_total() {
        let offer = sbmp::Datagram {
            session: 0x0007,
            dg_type: OFFER_TYPE,
            payload: &[0x04, 0x00, 0x00, 0x00],
        };
        let mut rx = BulkRx::begin(&offer).unwrap();

        // a chunk of some other session does not count
        let stray = sbmp::Datagram {
            session: 0x0008,
            dg_type: OFFER_TYPE,
            payload: b"zz",
        };
        assert!(!rx.receive(&stray));

        // bytes past the declared total are discarded
        let chunk = sbmp::Datagram {
            session: 0x0007,
            dg_type: OFFER_TYPE,
            payload: b"abcdef",
        };
        assert!(rx.receive(&chunk));
        assert_eq!(b"abcd".to_vec(), rx.into_data());
    }

    #[test]
    fn send_chunk_after_completion_is_done() {
        let uart_a = Uart::new();
        let app_a = App::new();
        let mut e1 = Endpoint::new(
            String::from("e1"),
            &uart_a,
            &app_a,
            EndpointConfig::default(),
            offer_handler,
        );

        let data = [1u8, 2, 3];
        let mut tx = BulkTx::offer(&mut e1, OFFER_TYPE, &data).unwrap();

        assert!(tx.send_chunk(&mut e1).unwrap());
        assert!(tx.send_chunk(&mut e1).unwrap());
        assert_eq!(0, tx.remaining());
    }
}
