/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

pub const CLIENT_PORT: u16 = 5222;

pub const SERVER_PORT: u16 = 5269;

pub const STREAM_TAG: &str = "stream:stream";

pub const STREAM_NS: &str = "http://etherx.jabber.org/streams";

pub const CLIENT_NS: &str = "jabber:client";

pub const STREAMS_ERROR_NS: &str = "urn:ietf:params:xml:ns:xmpp-streams";

pub const STANZAS_ERROR_NS: &str = "urn:ietf:params:xml:ns:xmpp-stanzas";

pub const TLS_NS: &str = "urn:ietf:params:xml:ns:xmpp-tls";

pub const SASL_NS: &str = "urn:ietf:params:xml:ns:xmpp-sasl";

pub const BIND_NS: &str = "urn:ietf:params:xml:ns:xmpp-bind";

pub const SESSION_NS: &str = "urn:ietf:params:xml:ns:xmpp-session";

pub const XML_LANG: &str = "xml:lang";

pub const ROSTER_NS: &str = "jabber:iq:roster";

pub const DISCO_INFO_NS: &str = "http://jabber.org/protocol/disco#info";

pub const DISCO_ITEMS_NS: &str = "http://jabber.org/protocol/disco#items";

pub const PUBSUB_NS: &str = "http://jabber.org/protocol/pubsub";

pub const PUBSUB_OWNER_NS: &str = "http://jabber.org/protocol/pubsub#owner";

pub const PUBSUB_EVENT_NS: &str = "http://jabber.org/protocol/pubsub#event";

pub const REGISTER_NS: &str = "jabber:iq:register";

pub const PRIVACY_NS: &str = "jabber:iq:privacy";

pub const VERSION_NS: &str = "jabber:iq:version";

pub const LAST_NS: &str = "jabber:iq:last";

pub const DATA_FORMS_NS: &str = "jabber:x:data";
